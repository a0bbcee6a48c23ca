//! Wire text encoding.
//!
//! SIE4 files are written in the IBM PC 8-bit code page (CP437, "PC8" in
//! the format marker); the in-memory model is plain Rust strings. Both
//! directions go through here so the file boundary is the only place that
//! ever sees raw bytes.

use codepage_437::{Cp437Error, ToCp437, CP437_CONTROL};

use crate::error::{Result, SieError};

/// Decode raw file bytes into internal text. Every byte is defined in
/// CP437, so decoding never fails.
pub fn decode(bytes: &[u8]) -> String {
    use codepage_437::FromCp437;
    String::from_cp437(bytes.to_vec(), &CP437_CONTROL)
}

/// Encode internal text into wire bytes.
pub fn encode(text: &str) -> Result<Vec<u8>> {
    text.to_cp437(&CP437_CONTROL)
        .map(|cow| cow.into_owned())
        .map_err(|e: Cp437Error| SieError::Encoding {
            valid_up_to: e.representable_up_to,
            context: truncate_for_context(text),
        })
}

fn truncate_for_context(text: &str) -> String {
    if text.chars().count() <= 40 {
        text.to_string()
    } else {
        let cut: String = text.chars().take(40).collect();
        format!("{cut}…")
    }
}
