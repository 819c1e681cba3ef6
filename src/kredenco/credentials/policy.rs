//! Password-protection policy: a slow salted KDF producing a
//! fixed-length value that is safe to store once protected at rest.
//!
//! The salt is generated once per registration and must be persisted
//! with the record; verification re-derives with the stored salt, never
//! a fresh one.

use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::Rng;
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// PBKDF2 rounds, above the 100k floor recommended for HMAC-SHA512.
pub const ITERATIONS: u32 = 210_000;

/// Derived value length in bytes (512 bits).
pub const DERIVED_LEN: usize = 64;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Generate a fresh random salt for one registration.
#[must_use]
pub fn generate_salt() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..SALT_LEN).map(|_| rng.gen()).collect()
}

/// Derive the fixed-length credential value from a password and salt.
#[must_use]
pub fn derive(password: &str, salt: &[u8]) -> Vec<u8> {
    let mut derived = vec![0u8; DERIVED_LEN];

    pbkdf2::<HmacSha512>(password.as_bytes(), salt, ITERATIONS, &mut derived);

    derived
}

/// Compare two derived values without short-circuiting on the first
/// differing byte, so the comparison time does not leak the mismatch
/// position.
#[must_use]
pub fn verify(derived: &[u8], stored: &[u8]) -> bool {
    if derived.len() != stored.len() {
        return false;
    }

    derived
        .iter()
        .zip(stored.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
