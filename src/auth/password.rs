//! Password Hashing
//! Mission: One-way salted hashes for stored credentials

use bcrypt::{hash, verify, BcryptResult};
use tracing::warn;

/// Default bcrypt work factor
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// bcrypt hasher with a fixed work factor.
///
/// Every call to [`PasswordHasher::hash`] draws a fresh random salt; the salt
/// and cost are embedded in the returned `$2b$` string, so verification needs
/// nothing but the stored hash.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password
    pub fn hash(&self, plaintext: &str) -> BcryptResult<String> {
        hash(plaintext, self.cost)
    }

    /// Check a candidate against a stored hash.
    ///
    /// A mismatch is a normal `false`. A stored value that is not a bcrypt
    /// hash at all is also reported as `false`, with a warning.
    pub fn verify(&self, plaintext: &str, hashed: &str) -> bool {
        match verify(plaintext, hashed) {
            Ok(valid) => valid,
            Err(e) => {
                warn!(error = %e, "Stored password hash could not be parsed");
                false
            }
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}
