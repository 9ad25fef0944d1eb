//! OTP code generation, normalization, and hashing.

use rand::{Rng, rngs::OsRng};
use sha2::{Digest, Sha256};

/// Fixed-length decimal code with each digit drawn independently from the
/// OS CSPRNG. Sampling per digit keeps the distribution uniform; a single
/// bounded integer would under-represent leading zeros.
#[must_use]
pub fn generate_code(length: usize) -> String {
    (0..length)
        .map(|_| char::from(b'0' + OsRng.gen_range(0..10u8)))
        .collect()
}

/// Strip the separators users paste in with their codes.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Codes are stored and compared as SHA-256 hex digests only.
#[must_use]
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}
