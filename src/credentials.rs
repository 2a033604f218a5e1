//! Salted credential hashing.
//!
//! Hashes are `hex(SHA-256(salt ‖ password))`. The salt is drawn per user, so
//! two users with the same password never share a hash. SHA-256 is a fast
//! digest and only suitable for the demo credentials this store seeds.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{Result, StoreError};

pub const DEFAULT_SALT_LEN: usize = 16;

/// Returns `length` bytes from the OS random source as lowercase hex.
pub fn generate_salt(length: usize) -> Result<String> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| StoreError::Entropy(e.to_string()))?;
    Ok(hex::encode(bytes))
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Re-hashes `password` with `salt` and compares against `expected_hash` in
/// constant time.
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    let candidate = hash_password(password, salt);
    candidate.as_bytes().ct_eq(expected_hash.as_bytes()).into()
}

/// Fresh salt plus the matching hash.
pub fn derive_credentials(password: &str) -> Result<(String, String)> {
    let salt = generate_salt(DEFAULT_SALT_LEN)?;
    let hash = hash_password(password, &salt);
    Ok((salt, hash))
}
