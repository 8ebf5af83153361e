use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the platform signature over the raw request body.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is missing")]
    Missing,
    #[error("signature header is not valid base64: {0}")]
    Malformed(String),
    #[error("signature does not match request body")]
    Mismatch,
}

/// Verifies the base64-encoded HMAC-SHA256 of the raw body against the
/// channel secret. Comparison is constant-time via `Mac::verify_slice`.
pub fn verify(
    channel_secret: &[u8],
    body: &[u8],
    header: Option<&str>,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let provided = BASE64
        .decode(header.trim())
        .map_err(|err| SignatureError::Malformed(err.to_string()))?;

    let mut mac = HmacSha256::new_from_slice(channel_secret).map_err(|_| SignatureError::Mismatch)?;
    mac.update(body);
    mac.verify_slice(&provided).map_err(|_| SignatureError::Mismatch)
}

/// Produces the header value the platform would send for `body`. Used by
/// tests and local webhook tooling to forge valid requests.
pub fn sign(channel_secret: &[u8], body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(channel_secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}
