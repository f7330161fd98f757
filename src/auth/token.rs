//! Opaque token generation and hashing
//!
//! Sessions and API keys are both random bearer tokens. Only the SHA-256
//! hash of a token is stored; the plaintext is returned to the client once
//! and never again.

use rand::RngCore;
use sha2::{Digest, Sha256};

pub const API_KEY_PREFIX: &str = "mk_";

/// 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of the full token string, hex encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Mint a fresh API key. Returns the plaintext key to hand to the client
/// and the hash to store.
pub fn generate_api_key() -> (String, String) {
    let key = format!("{}{}", API_KEY_PREFIX, generate_token());
    let hash = hash_token(&key);
    (key, hash)
}
