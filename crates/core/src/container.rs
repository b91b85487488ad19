//! The pseudo-container that carries native frames from the framer to the
//! extractor.
//!
//! There are no length fields. Each frame is framed as:
//!
//! ```text
//! offset 0..4    MAGIC = 20 20 37 0B
//! offset 4..25   parameter-set probe window (PARAMETER_SET_PROBE_LEN bytes)
//! offset 25..    coded picture, up to the next MAGIC or the end of data
//! ```
//!
//! The framer writes the native parameter set verbatim, so the probe window
//! only lines up with it when the parameter set is exactly
//! [`PARAMETER_SET_PROBE_LEN`] bytes long. Producers that control their
//! parameter sets can use [`conform_parameter_set`] to get exact framing.

use crate::error::{IngestError, Result};

/// Marker at the start of every pseudo-container.
pub const MAGIC: [u8; 4] = [0x20, 0x20, 0x37, 0x0B];

/// Fixed size of the parameter-set window that follows [`MAGIC`].
pub const PARAMETER_SET_PROBE_LEN: usize = 21;

/// One framed frame, consumed front to back by sequential reads.
#[derive(Debug)]
pub struct PseudoContainer {
    bytes: Vec<u8>,
    cursor: usize,
}

impl PseudoContainer {
    /// Build `MAGIC ++ parameter_set ++ frame`.
    pub fn build(parameter_set: &[u8], frame: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(MAGIC.len() + parameter_set.len() + frame.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(parameter_set);
        bytes.extend_from_slice(frame);
        Self { bytes, cursor: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Copy as many unread bytes as fit into `buf` and advance past them.
    pub fn read_into(&mut self, buf: &mut [u8]) -> usize {
        let n = self.remaining().min(buf.len());
        buf[..n].copy_from_slice(&self.bytes[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }
}

/// Index of the first complete [`MAGIC`] in `data`.
pub fn find_magic(data: &[u8]) -> Option<usize> {
    data.windows(MAGIC.len()).position(|w| w == MAGIC)
}

/// Number of leading bytes of `chunk` that belong to the current picture.
///
/// Stops at the first complete [`MAGIC`]. Without one, a trailing partial
/// marker (`20`, `20 20`, `20 20 37`) is held back so the next read can see
/// the whole marker.
pub fn sample_len(chunk: &[u8]) -> usize {
    if let Some(pos) = find_magic(chunk) {
        return pos;
    }

    let max_prefix = (MAGIC.len() - 1).min(chunk.len());
    for prefix in (1..=max_prefix).rev() {
        if chunk[chunk.len() - prefix..] == MAGIC[..prefix] {
            return chunk.len() - prefix;
        }
    }
    chunk.len()
}

/// Zero-pad a parameter set to exactly [`PARAMETER_SET_PROBE_LEN`] bytes.
///
/// Longer parameter sets cannot be framed without losing bytes and are
/// rejected with [`IngestError::ParameterSetTooLong`].
pub fn conform_parameter_set(parameter_set: &[u8]) -> Result<Vec<u8>> {
    if parameter_set.len() > PARAMETER_SET_PROBE_LEN {
        return Err(IngestError::ParameterSetTooLong {
            len: parameter_set.len(),
            max: PARAMETER_SET_PROBE_LEN,
        });
    }
    let mut padded = parameter_set.to_vec();
    padded.resize(PARAMETER_SET_PROBE_LEN, 0);
    Ok(padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_magic_parameter_set_frame() {
        let container = PseudoContainer::build(&[0x67, 0x42], &[1, 2, 3]);
        assert_eq!(
            container.as_bytes(),
            &[0x20, 0x20, 0x37, 0x0B, 0x67, 0x42, 1, 2, 3]
        );
        assert_eq!(container.len(), 9);
        assert_eq!(container.remaining(), 9);
    }

    #[test]
    fn thirty_bytes_in_chunks_of_ten() {
        let parameter_set = [0x67u8; 13];
        let frame: Vec<u8> = (0..13).collect();
        let mut container = PseudoContainer::build(&parameter_set, &frame);
        assert_eq!(container.len(), 30);
        let expected = container.as_bytes().to_vec();

        let mut out = Vec::new();
        let mut buf = [0u8; 10];
        for _ in 0..3 {
            let n = container.read_into(&mut buf);
            assert_eq!(n, 10);
            out.extend_from_slice(&buf[..n]);
        }
        assert!(container.is_exhausted());
        assert_eq!(container.read_into(&mut buf), 0);
        assert_eq!(out, expected);
    }

    #[test]
    fn single_byte_reads_reconstruct() {
        let mut container = PseudoContainer::build(&[9, 8, 7], &[6, 5]);
        let expected = container.as_bytes().to_vec();
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        while container.read_into(&mut byte) == 1 {
            out.push(byte[0]);
        }
        assert_eq!(out, expected);
    }

    #[test]
    fn short_final_read() {
        let mut container = PseudoContainer::build(&[], &[1, 2]);
        let mut buf = [0u8; 4];
        assert_eq!(container.read_into(&mut buf), 4);
        assert_eq!(container.read_into(&mut buf), 2);
        assert_eq!(&buf[..2], &[1, 2]);
    }

    #[test]
    fn sample_len_stops_at_magic() {
        let chunk = [1, 2, 3, 0x20, 0x20, 0x37, 0x0B, 9];
        assert_eq!(find_magic(&chunk), Some(3));
        assert_eq!(sample_len(&chunk), 3);
        assert_eq!(sample_len(&MAGIC), 0);
    }

    #[test]
    fn sample_len_holds_back_partial_magic() {
        assert_eq!(sample_len(&[1, 2, 0x20, 0x20, 0x37]), 2);
        assert_eq!(sample_len(&[1, 2, 0x20, 0x20]), 2);
        assert_eq!(sample_len(&[1, 2, 0x20]), 2);
        assert_eq!(sample_len(&[1, 2, 0x37]), 3);
        assert_eq!(sample_len(&[0x20]), 0);
        assert_eq!(sample_len(&[]), 0);
    }

    #[test]
    fn conform_pads_and_rejects() {
        let padded = conform_parameter_set(&[0x67, 0x42]).unwrap();
        assert_eq!(padded.len(), PARAMETER_SET_PROBE_LEN);
        assert_eq!(&padded[..2], &[0x67, 0x42]);
        assert!(padded[2..].iter().all(|&b| b == 0));

        assert!(matches!(
            conform_parameter_set(&[0; PARAMETER_SET_PROBE_LEN + 1]),
            Err(IngestError::ParameterSetTooLong { len: 22, max: 21 })
        ));
    }
}
