//! `sprop-parameter-sets` decoding (RFC 6184 §8.1).
//!
//! The SDP `a=fmtp` line of an H.264 stream carries the out-of-band
//! parameter sets as a comma-separated list of base64 NAL units, usually
//! `<SPS>,<PPS>`:
//!
//! ```text
//! a=fmtp:96 packetization-mode=1;sprop-parameter-sets=Z0IAHg==,aM44gA==
//! ```

use base64::prelude::{BASE64_STANDARD, Engine as _};

use crate::error::Result;

/// Decode each base64 record of a `sprop-parameter-sets` value.
///
/// Accepts either the bare value or a whole fmtp parameter list (the
/// `sprop-parameter-sets=` key is located and the value taken up to the
/// next `;`). Empty records are skipped.
pub fn parse_sprop_parameter_sets(value: &str) -> Result<Vec<Vec<u8>>> {
    let value = extract_value(value);

    let mut records = Vec::new();
    for record in value.split(',') {
        let record = record.trim();
        if record.is_empty() {
            continue;
        }
        records.push(BASE64_STANDARD.decode(record)?);
    }

    tracing::trace!(records = records.len(), "sprop-parameter-sets decoded");
    Ok(records)
}

fn extract_value(fmtp: &str) -> &str {
    const KEY: &str = "sprop-parameter-sets=";
    match fmtp.find(KEY) {
        Some(pos) => {
            let rest = &fmtp[pos + KEY.len()..];
            rest.split(';').next().unwrap_or(rest)
        }
        None => fmtp,
    }
}
