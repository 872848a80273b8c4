//! Secure random tokens for the CSRF `state` and the PKCE verifier.

use {
    base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD},
    rand::{TryRngCore, rngs::OsRng},
};

use crate::error::{Error, Result};

/// Number of random bytes behind the `state` parameter.
pub const STATE_BYTES: usize = 32;

/// Fill `len` bytes from the operating system CSPRNG.
///
/// There is no fallback: if the OS source fails, the caller gets [`Error::Entropy`].
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| Error::Entropy(e.to_string()))?;
    Ok(buf)
}

/// `len` random bytes, hex encoded (`2 * len` characters).
pub fn random_hex(len: usize) -> Result<String> {
    Ok(hex::encode(random_bytes(len)?))
}

/// `len` random bytes, URL-safe base64 without padding.
pub fn random_base64url(len: usize) -> Result<String> {
    Ok(URL_SAFE_NO_PAD.encode(random_bytes(len)?))
}

/// Fresh CSRF `state` value for a grant request.
pub fn generate_state() -> Result<String> {
    random_hex(STATE_BYTES)
}
