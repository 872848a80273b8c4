use {
    base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD},
    secrecy::Secret,
    sha2::{Digest, Sha256},
};

use crate::{error::Result, random};

/// PKCE challenge method sent with the grant request.
pub const CHALLENGE_METHOD: &str = "S256";

const VERIFIER_BYTES: usize = 32;

/// PKCE verifier and its S256 challenge.
#[derive(Debug)]
pub struct PkceChallenge {
    pub verifier: Secret<String>,
    pub challenge: String,
}

/// Generate a fresh verifier (32 random bytes, base64url) and its challenge.
pub fn generate() -> Result<PkceChallenge> {
    let verifier = random::random_base64url(VERIFIER_BYTES)?;
    let challenge = challenge_for(&verifier);
    Ok(PkceChallenge {
        verifier: Secret::new(verifier),
        challenge,
    })
}

/// `base64url_nopad(SHA-256(verifier))`.
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
