//! Refresh secrets
//!
//! The plaintext goes to the browser once, in the `refresh` cookie. The
//! server only ever stores its SHA-256 hex digest.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Bytes of randomness in a refresh secret
pub const REFRESH_SECRET_BYTES: usize = 32;

/// A freshly minted refresh secret and its digest
pub struct RefreshSecret {
    pub plaintext: String,
    pub hash: String,
}

impl RefreshSecret {
    /// Generate 32 random bytes, base64url-encoded without padding
    pub fn generate() -> Self {
        let mut bytes = [0u8; REFRESH_SECRET_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let plaintext = URL_SAFE_NO_PAD.encode(bytes);
        let hash = hash_refresh_secret(&plaintext);
        Self { plaintext, hash }
    }
}

/// Lowercase hex SHA-256 of the secret as presented in the cookie
pub fn hash_refresh_secret(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}
