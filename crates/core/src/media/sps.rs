//! H.264 sequence parameter set parsing (ISO/IEC 14496-10 §7.3.2.1.1).
//!
//! The bitstream syntax is handled by [`h264_reader`]; this module only
//! turns the result into the geometry, aspect ratio and codec string the
//! track format needs.
//!
//! The input is usually a fixed-size probe window rather than a bare NAL
//! unit, so trailing zero bytes after the RBSP stop bit are dropped before
//! parsing (they are `trailing_zero_8bits` in Annex B terms).

use h264_reader::nal::sps::{FrameMbsFlags, SeqParameterSet, SpsError};
use h264_reader::rbsp::{BitReader, BitReaderError, decode_nal};

use super::annexb::NAL_TYPE_SPS;
use crate::error::ParameterSetErrorKind;

type ParseResult<T> = std::result::Result<T, ParameterSetErrorKind>;

/// Geometry and identification extracted from an SPS.
#[derive(Debug, Clone, PartialEq)]
pub struct SpsData {
    pub profile_idc: u8,
    pub constraint_flags: u8,
    pub level_idc: u8,
    pub seq_parameter_set_id: u8,
    /// Display width in pixels, after cropping.
    pub width: u32,
    /// Display height in pixels, after cropping.
    pub height: u32,
    pub pixel_width_height_ratio: f32,
    pub frame_mbs_only: bool,
}

impl SpsData {
    /// RFC 6381 codec string, e.g. `avc1.42001E`.
    pub fn codec_string(&self) -> String {
        format!(
            "avc1.{:02X}{:02X}{:02X}",
            self.profile_idc, self.constraint_flags, self.level_idc
        )
    }
}

/// Parse an SPS NAL unit (header byte included, no start code).
pub fn parse_sps(nal: &[u8]) -> ParseResult<SpsData> {
    let &header = nal.first().ok_or(ParameterSetErrorKind::Truncated)?;
    let nal_type = header & 0x1f;
    if nal_type != NAL_TYPE_SPS {
        return Err(ParameterSetErrorKind::NotSps(nal_type));
    }

    let end = nal.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let rbsp = decode_nal(&nal[..end]).map_err(|e| {
        tracing::debug!(error = %e, "SPS emulation prevention");
        ParameterSetErrorKind::Malformed
    })?;
    // profile_idc, constraint flags, level_idc, then at least one ue(v).
    if rbsp.len() < 4 {
        return Err(ParameterSetErrorKind::Truncated);
    }

    let sps = SeqParameterSet::from_bits(BitReader::new(&rbsp[..])).map_err(sps_error_kind)?;
    let (width, height) = sps.pixel_dimensions().map_err(sps_error_kind)?;
    if width == 0 || height == 0 {
        return Err(ParameterSetErrorKind::InvalidDimensions);
    }

    let pixel_width_height_ratio = sps
        .vui_parameters
        .as_ref()
        .and_then(|vui| vui.aspect_ratio_info.as_ref())
        .and_then(|info| info.clone().get())
        .filter(|&(h, v)| h != 0 && v != 0)
        .map_or(1.0, |(h, v)| f32::from(h) / f32::from(v));

    Ok(SpsData {
        profile_idc: rbsp[0],
        constraint_flags: rbsp[1],
        level_idc: rbsp[2],
        seq_parameter_set_id: sps.seq_parameter_set_id.id(),
        width,
        height,
        pixel_width_height_ratio,
        frame_mbs_only: matches!(sps.frame_mbs_flags, FrameMbsFlags::Frames),
    })
}

fn sps_error_kind(e: SpsError) -> ParameterSetErrorKind {
    match e {
        SpsError::RbspReaderError(BitReaderError::ExpGolombTooLarge(_)) => {
            ParameterSetErrorKind::InvalidExpGolomb
        }
        SpsError::RbspReaderError(
            BitReaderError::ReaderError(_) | BitReaderError::ReaderErrorFor(..),
        ) => ParameterSetErrorKind::Truncated,
        SpsError::CroppingError(_) => ParameterSetErrorKind::InvalidDimensions,
        other => {
            tracing::debug!(error = ?other, "SPS rejected");
            ParameterSetErrorKind::Malformed
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Baseline, level 3.0, 640x480, no VUI.
    pub(crate) const SPS_640X480: [u8; 9] = [0x67, 0x42, 0x00, 0x1E, 0xF4, 0x05, 0x01, 0xEC, 0x80];

    /// MSB-first writer used to build SPS payloads; emulation prevention is
    /// applied on [`finish`](Self::finish).
    #[derive(Default)]
    pub(crate) struct BitWriter {
        bytes: Vec<u8>,
        current: u8,
        filled: u8,
    }

    impl BitWriter {
        pub fn flag(&mut self, bit: bool) -> &mut Self {
            self.current = (self.current << 1) | u8::from(bit);
            self.filled += 1;
            if self.filled == 8 {
                self.bytes.push(self.current);
                self.current = 0;
                self.filled = 0;
            }
            self
        }

        pub fn bits(&mut self, value: u32, count: u32) -> &mut Self {
            for i in (0..count).rev() {
                self.flag((value >> i) & 1 == 1);
            }
            self
        }

        pub fn ue(&mut self, value: u32) -> &mut Self {
            let code = u64::from(value) + 1;
            let len = 64 - code.leading_zeros();
            for _ in 0..len - 1 {
                self.flag(false);
            }
            for i in (0..len).rev() {
                self.flag((code >> i) & 1 == 1);
            }
            self
        }

        pub fn se(&mut self, value: i32) -> &mut Self {
            let code = if value > 0 {
                (value as u32) * 2 - 1
            } else {
                value.unsigned_abs() * 2
            };
            self.ue(code)
        }

        /// Stop bit, byte alignment, emulation prevention, NAL header.
        pub fn finish(&mut self) -> Vec<u8> {
            self.flag(true);
            while self.filled != 0 {
                self.flag(false);
            }

            let mut nal = vec![0x67];
            let mut zeros = 0;
            for &byte in &self.bytes {
                if zeros >= 2 && byte <= 3 {
                    nal.push(3);
                    zeros = 0;
                }
                zeros = if byte == 0 { zeros + 1 } else { 0 };
                nal.push(byte);
            }
            nal
        }
    }

    /// Common SPS prefix up to and including `seq_parameter_set_id`.
    fn baseline_prefix(w: &mut BitWriter) {
        w.bits(66, 8).bits(0xC0, 8).bits(30, 8).ue(0);
    }

    /// VUI flags after `aspect_ratio_info`, all absent.
    fn vui_tail(w: &mut BitWriter) {
        for _ in 0..7 {
            w.flag(false);
        }
    }

    /// Progressive baseline SPS without cropping or VUI.
    pub(crate) fn baseline_sps(width_mbs_minus1: u32, height_map_units_minus1: u32) -> Vec<u8> {
        let mut w = BitWriter::default();
        baseline_prefix(&mut w);
        w.ue(0).ue(0).ue(0).ue(1).flag(false);
        w.ue(width_mbs_minus1).ue(height_map_units_minus1);
        w.flag(true).flag(true).flag(false).flag(false);
        w.finish()
    }

    #[test]
    fn parses_baseline_640x480() {
        let sps = parse_sps(&SPS_640X480).unwrap();
        assert_eq!(sps.width, 640);
        assert_eq!(sps.height, 480);
        assert_eq!(sps.profile_idc, 66);
        assert_eq!(sps.level_idc, 30);
        assert_eq!(sps.pixel_width_height_ratio, 1.0);
        assert!(sps.frame_mbs_only);
        assert_eq!(sps.codec_string(), "avc1.42001E");
    }

    #[test]
    fn tolerates_zero_padded_window() {
        let mut window = SPS_640X480.to_vec();
        window.resize(21, 0);
        let sps = parse_sps(&window).unwrap();
        assert_eq!((sps.width, sps.height), (640, 480));
    }

    #[test]
    fn builds_baseline_geometry() {
        let sps = parse_sps(&baseline_sps(19, 14)).unwrap();
        assert_eq!((sps.width, sps.height), (320, 240));
        assert_eq!(sps.seq_parameter_set_id, 0);
    }

    #[test]
    fn high_profile_1080p_with_cropping() {
        let mut w = BitWriter::default();
        w.bits(100, 8).bits(0, 8).bits(40, 8).ue(0);
        w.ue(1).ue(0).ue(0).flag(false).flag(false); // 4:2:0, 8 bit, no scaling
        w.ue(0).ue(0).ue(2); // frame num, poc type 0, lsb
        w.ue(4).flag(false);
        w.ue(119).ue(67).flag(true).flag(true);
        w.flag(true).ue(0).ue(0).ue(0).ue(4); // crop 8 lines at the bottom
        w.flag(false);
        let sps = parse_sps(&w.finish()).unwrap();
        assert_eq!((sps.width, sps.height), (1920, 1080));
        assert_eq!(sps.profile_idc, 100);
    }

    #[test]
    fn high_profile_with_scaling_list() {
        let mut w = BitWriter::default();
        w.bits(100, 8).bits(0, 8).bits(31, 8).ue(0);
        w.ue(1).ue(0).ue(0).flag(false);
        w.flag(true); // seq_scaling_matrix_present_flag
        w.flag(true); // list 0 present
        for _ in 0..16 {
            w.se(0);
        }
        for _ in 1..8 {
            w.flag(false);
        }
        w.ue(0).ue(2); // poc type 2
        w.ue(1).flag(false);
        w.ue(79).ue(44).flag(true).flag(true).flag(false).flag(false);
        let sps = parse_sps(&w.finish()).unwrap();
        assert_eq!((sps.width, sps.height), (1280, 720));
    }

    #[test]
    fn interlaced_doubles_map_units() {
        let mut w = BitWriter::default();
        baseline_prefix(&mut w);
        w.ue(0).ue(1); // poc type 1
        w.flag(false).se(-2).se(3).ue(2).se(1).se(-1);
        w.ue(1).flag(false);
        w.ue(44).ue(17).flag(false).flag(true).flag(true); // field coded, mb_adaptive
        w.flag(false).flag(false);
        let sps = parse_sps(&w.finish()).unwrap();
        assert_eq!((sps.width, sps.height), (720, 576));
        assert!(!sps.frame_mbs_only);
    }

    #[test]
    fn vui_extended_sar() {
        let mut w = BitWriter::default();
        baseline_prefix(&mut w);
        w.ue(0).ue(2).ue(1).flag(false);
        w.ue(43).ue(35).flag(true).flag(true).flag(false);
        w.flag(true).flag(true).bits(255, 8).bits(4, 16).bits(3, 16);
        vui_tail(&mut w);
        let sps = parse_sps(&w.finish()).unwrap();
        assert_eq!((sps.width, sps.height), (704, 576));
        assert!((sps.pixel_width_height_ratio - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn vui_table_sar() {
        let mut w = BitWriter::default();
        baseline_prefix(&mut w);
        w.ue(0).ue(2).ue(1).flag(false);
        w.ue(43).ue(35).flag(true).flag(true).flag(false);
        w.flag(true).flag(true).bits(2, 8);
        vui_tail(&mut w);
        let sps = parse_sps(&w.finish()).unwrap();
        assert!((sps.pixel_width_height_ratio - 12.0 / 11.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_non_sps_nal() {
        assert_eq!(
            parse_sps(&[0x68, 0xce, 0x38, 0x80]),
            Err(ParameterSetErrorKind::NotSps(8))
        );
    }

    #[test]
    fn truncated_window() {
        assert_eq!(
            parse_sps(&SPS_640X480[..6]),
            Err(ParameterSetErrorKind::Truncated)
        );
        assert_eq!(parse_sps(&[]), Err(ParameterSetErrorKind::Truncated));
    }

    #[test]
    fn over_long_exp_golomb_is_invalid() {
        let mut w = BitWriter::default();
        w.bits(66, 8).bits(0, 8).bits(30, 8).bits(0, 32);
        assert_eq!(
            parse_sps(&w.finish()),
            Err(ParameterSetErrorKind::InvalidExpGolomb)
        );
    }

    #[test]
    fn all_zero_payload_is_truncated() {
        let mut window = vec![0x67, 0x42, 0x00, 0x1e];
        window.extend_from_slice(&[0; 17]);
        assert_eq!(parse_sps(&window), Err(ParameterSetErrorKind::Truncated));
    }

    #[test]
    fn over_cropping_is_invalid() {
        let mut w = BitWriter::default();
        baseline_prefix(&mut w);
        w.ue(0).ue(2).ue(1).flag(false);
        w.ue(0).ue(0).flag(true).flag(true);
        w.flag(true).ue(9).ue(0).ue(0).ue(0);
        w.flag(false);
        assert_eq!(
            parse_sps(&w.finish()),
            Err(ParameterSetErrorKind::InvalidDimensions)
        );
    }

    #[test]
    fn emulation_prevention_is_removed() {
        // num_units_in_tick = 1 puts `00 00 00` in the payload.
        let mut w = BitWriter::default();
        baseline_prefix(&mut w);
        w.ue(0).ue(2).ue(1).flag(false);
        w.ue(39).ue(29).flag(true).flag(true).flag(false);
        w.flag(true).flag(false); // vui, no aspect ratio
        w.flag(false).flag(false).flag(false);
        w.flag(true).bits(1, 32).bits(50, 32).flag(true); // timing
        w.flag(false).flag(false).flag(false).flag(false);
        let nal = w.finish();
        assert!(nal.windows(3).any(|win| win == [0, 0, 3]));
        let sps = parse_sps(&nal).unwrap();
        assert_eq!((sps.width, sps.height), (640, 480));
        assert_eq!(sps.pixel_width_height_ratio, 1.0);
    }
}
