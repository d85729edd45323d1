//! Password hashing with Argon2id.
//!
//! Every hash uses the same fixed work factor and a fresh random salt, so
//! hashing the same password twice yields two different PHC strings.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use super::AuthError;

/// Memory cost in KiB
pub const MEMORY_COST_KIB: u32 = 19_456;
/// Number of passes
pub const TIME_COST: u32 = 2;
/// Lanes
pub const PARALLELISM: u32 = 1;

/// Well-formed hash that matches no password. Verifying against it costs the
/// same as verifying a real hash, which keeps login timing flat for unknown
/// emails.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher {
    pub fn new() -> Self {
        // Params::DEFAULT is m=19456, t=2, p=1
        Self {
            params: Params::DEFAULT,
        }
    }

    /// Cheap parameters so test suites don't spend seconds per hash
    #[cfg(test)]
    pub(crate) fn insecure_for_tests() -> Self {
        Self {
            params: Params::new(64, 1, 1, None).expect("valid test params"),
        }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password into a PHC string
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash. Unparsable hashes never match.
    pub fn compare(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        // Parameters come from the stored hash, not from `self`
        self.argon2()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Burn one verification worth of CPU and report a mismatch.
    pub fn compare_dummy(&self, password: &str) -> bool {
        let _ = self.compare(password, DUMMY_HASH);
        false
    }
}
