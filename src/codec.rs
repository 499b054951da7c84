//! # Key Codec
//!
//! Transport-safe textual form for public keys, nonces and signatures.
//! Everything on the wire is standard base64 (with padding) of the raw bytes,
//! which is what `btoa()` in browsers and most CLI tooling produce.

use crate::error::AuthError;
use base64::prelude::*;

/// Encode raw key/signature/nonce bytes for transport.
pub fn encode(raw: &[u8]) -> String {
    BASE64_STANDARD.encode(raw)
}

/// Decode a transport string back to raw bytes.
///
/// Surrounding whitespace is tolerated (copy/paste from terminals), anything
/// else that is not valid standard base64 is `MalformedEncoding`.
pub fn decode(text: &str) -> Result<Vec<u8>, AuthError> {
    BASE64_STANDARD
        .decode(text.trim().as_bytes())
        .map_err(|_| AuthError::MalformedEncoding)
}

/// Decode a field that must not be empty once decoded.
///
/// `field` only shapes the error message shown to the caller.
pub fn decode_field(field: &'static str, text: &str) -> Result<Vec<u8>, AuthError> {
    let bytes = decode(text).map_err(|_| AuthError::MalformedField(field))?;
    if bytes.is_empty() {
        return Err(AuthError::MalformedField(field));
    }
    Ok(bytes)
}
