//! H.264 bitstream helpers used on both sides of the pseudo-container.
//!
//! | Module | Purpose | Reference |
//! |--------|---------|-----------|
//! | [`annexb`] | Start-code splitting, regrouping into SPS + pictures | ISO/IEC 14496-10 Annex B |
//! | [`sps`] | Geometry and aspect ratio from a sequence parameter set | ISO/IEC 14496-10 §7.3.2.1.1, Annex E |
//! | [`sprop`] | Out-of-band parameter sets from SDP | [RFC 6184 §8.1](https://tools.ietf.org/html/rfc6184) |

pub mod annexb;
pub mod sps;
pub mod sprop;

pub use sps::{SpsData, parse_sps};
