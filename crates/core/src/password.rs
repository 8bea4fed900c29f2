//! Salted password hashing.
//!
//! A stored hash is `sha256(hex(sha256(password)) || hex(sha256(salt)))`, hex encoded. Salts
//! are random alphanumeric strings generated per account.

use crate::constants::SALT_LEN;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

pub fn generate_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let password_digest = hex::encode(Sha256::digest(password.as_bytes()));
    let salt_digest = hex::encode(Sha256::digest(salt.as_bytes()));

    let mut hasher = Sha256::new();
    hasher.update(password_digest.as_bytes());
    hasher.update(salt_digest.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare `password` against a stored hash without short-circuiting on the first
/// differing byte.
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    let actual = hash_password(password, salt);
    if actual.len() != expected_hash.len() {
        return false;
    }
    actual
        .bytes()
        .zip(expected_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
