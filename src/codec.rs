//! Identifier codec.
//!
//! Shell identifiers travel through path segments and cursors as base64url
//! (RFC 4648 section 5) without padding. Decoding is tolerant of padding so
//! tokens produced by padded encoders are accepted as well.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::{Error, Result};

/// URL-safe alphabet, no padding on encode, padding optional on decode.
const IDENTIFIER_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encodes raw bytes.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    IDENTIFIER_ENGINE.encode(bytes)
}

/// Encodes the UTF-8 bytes of a string.
#[must_use]
pub fn encode_str(text: &str) -> String {
    encode(text.as_bytes())
}

/// Decodes a token into raw bytes.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the token is not valid base64url.
pub fn decode(token: &str) -> Result<Vec<u8>> {
    IDENTIFIER_ENGINE
        .decode(token)
        .map_err(|e| Error::InvalidInput(format!("'{token}' is not base64url encoded: {e}")))
}

/// Decodes a token into a UTF-8 string.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the token is not valid base64url or the
/// decoded bytes are not UTF-8.
pub fn decode_str(token: &str) -> Result<String> {
    let bytes = decode(token)?;
    String::from_utf8(bytes)
        .map_err(|_| Error::InvalidInput(format!("'{token}' does not decode to UTF-8 text")))
}
