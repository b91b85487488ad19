/// 4-byte Annex B start code prepended to every picture handed downstream.
pub const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// NAL unit types this module distinguishes (ISO/IEC 14496-10 Table 7-1).
pub const NAL_TYPE_NON_IDR: u8 = 1;
pub const NAL_TYPE_IDR: u8 = 5;
pub const NAL_TYPE_SPS: u8 = 7;
pub const NAL_TYPE_PPS: u8 = 8;

/// Iterator over the NAL units of an Annex B byte stream.
///
/// Units are yielded without their start code. The zero byte of a 4-byte
/// start code, and any `trailing_zero_8bits`, are trimmed off the unit
/// before it. Bytes ahead of the first start code are skipped.
#[derive(Debug, Clone)]
pub struct NalUnits<'a> {
    rest: &'a [u8],
}

/// Offset of the next `00 00 01` in `data`.
fn find_start_code(data: &[u8]) -> Option<usize> {
    data.windows(3).position(|w| w == [0, 0, 1])
}

impl<'a> Iterator for NalUnits<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        loop {
            let start = find_start_code(self.rest)? + 3;
            let body = &self.rest[start..];
            let (unit, rest) = match find_start_code(body) {
                Some(end) => body.split_at(end),
                None => (body, &[][..]),
            };
            self.rest = rest;

            let len = unit.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            if len > 0 {
                return Some(&unit[..len]);
            }
        }
    }
}

/// NAL units of `data`, in stream order.
pub fn nal_units(data: &[u8]) -> NalUnits<'_> {
    NalUnits { rest: data }
}

/// NAL unit type from the first header byte.
pub fn nal_type(nal: &[u8]) -> Option<u8> {
    nal.first().map(|header| header & 0x1f)
}

/// An elementary stream regrouped for the frame bridge.
#[derive(Debug, Default)]
pub struct ElementaryStream {
    /// First SPS found in the stream.
    pub sps: Option<Vec<u8>>,
    /// First PPS found in the stream.
    pub pps: Option<Vec<u8>>,
    /// One entry per coded slice, in Annex B form (start code + NAL).
    ///
    /// Non-VCL units other than SPS/PPS (SEI, AUD, ...) are prepended to the
    /// next picture. Multi-slice pictures are not merged.
    pub pictures: Vec<Vec<u8>>,
}

impl ElementaryStream {
    pub fn from_annexb(data: &[u8]) -> Self {
        let mut stream = ElementaryStream::default();
        let mut pending: Vec<u8> = Vec::new();

        for nal in nal_units(data) {
            match nal_type(nal) {
                Some(NAL_TYPE_SPS) => {
                    if stream.sps.is_none() {
                        tracing::debug!("H.264 SPS captured from bitstream ({} bytes)", nal.len());
                        stream.sps = Some(nal.to_vec());
                    }
                }
                Some(NAL_TYPE_PPS) => {
                    if stream.pps.is_none() {
                        tracing::debug!("H.264 PPS captured from bitstream ({} bytes)", nal.len());
                        stream.pps = Some(nal.to_vec());
                    }
                }
                Some(NAL_TYPE_NON_IDR..=NAL_TYPE_IDR) => {
                    pending.extend_from_slice(&START_CODE);
                    pending.extend_from_slice(nal);
                    stream.pictures.push(std::mem::take(&mut pending));
                }
                _ => {
                    pending.extend_from_slice(&START_CODE);
                    pending.extend_from_slice(nal);
                }
            }
        }

        tracing::debug!(
            pictures = stream.pictures.len(),
            has_sps = stream.sps.is_some(),
            "elementary stream split"
        );
        stream
    }
}
