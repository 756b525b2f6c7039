//! Salted password digests.
//!
//! Stored format: `<salt_hex>$<sha256_hex>` where the digest covers
//! `salt_hex || plaintext`. The salt is 16 bytes from the OS RNG, so hashing
//! the same password twice never yields the same string.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const SALT_BYTES: usize = 16;

const SEPARATOR: char = '$';

/// Hash `plaintext` with a fresh random salt.
#[must_use]
pub fn hash(plaintext: &str) -> String {
    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    let salt = hex::encode(salt);
    let digest = digest(&salt, plaintext);

    format!("{salt}{SEPARATOR}{digest}")
}

/// Check `plaintext` against a stored hash. Malformed hashes never match.
#[must_use]
pub fn verify(plaintext: &str, stored_hash: &str) -> bool {
    let Some((salt, expected)) = stored_hash.split_once(SEPARATOR) else {
        return false;
    };
    if salt.is_empty() || expected.is_empty() {
        return false;
    }

    let actual = digest(salt, plaintext);
    actual.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn digest(salt: &str, plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}
