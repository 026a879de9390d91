use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand_core::OsRng;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid Argon2 parameters: {0}")]
    Params(argon2::Error),

    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
}

/// Argon2 work factor. Defaults match the argon2 crate's recommended values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Hashes and verifies passwords.
///
/// Verification reads the algorithm, parameters and salt out of the stored hash,
/// so hashes written under an older `HashCost` keep verifying after the cost changes.
#[derive(Clone)]
pub struct Credentials {
    argon2: Argon2<'static>,
    // Verified against when the account does not exist, so lookups for unknown
    // usernames take as long as a wrong password.
    dummy_hash: String,
}

impl Credentials {
    pub fn new(cost: HashCost) -> Result<Self, CredentialError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(CredentialError::Params)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let dummy_hash = argon2
            .hash_password(b"feedback-dummy-password", &salt)
            .map_err(CredentialError::Hash)?
            .to_string();

        Ok(Self { argon2, dummy_hash })
    }

    /// Hash with a fresh random salt. Two calls on the same input never match textually.
    pub fn hash(&self, raw_password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(raw_password.as_bytes(), &salt)
            .map_err(CredentialError::Hash)?;
        Ok(hash.to_string())
    }

    /// True iff `raw_password` produced `hash`. The digest comparison is constant time.
    pub fn verify(&self, raw_password: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored password hash is malformed: {}", e);
                return false;
            }
        };

        self.argon2
            .verify_password(raw_password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Spend one verification's worth of work and report failure.
    pub fn verify_absent(&self, raw_password: &str) -> bool {
        let _ = self.verify(raw_password, &self.dummy_hash);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Credentials {
        Credentials::new(HashCost {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn hash_verify_roundtrip() {
        let creds = cheap();
        let hash = creds.hash("password123").unwrap();
        assert_ne!(hash, "password123");
        assert!(hash.starts_with("$argon2id$"));
        assert!(creds.verify("password123", &hash));
    }

    #[test]
    fn wrong_password_fails() {
        let creds = cheap();
        let hash = creds.hash("password123").unwrap();
        assert!(!creds.verify("password124", &hash));
        assert!(!creds.verify("", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let creds = cheap();
        let a = creds.hash("password123").unwrap();
        let b = creds.hash("password123").unwrap();
        assert_ne!(a, b);
        assert!(creds.verify("password123", &a));
        assert!(creds.verify("password123", &b));
    }

    #[test]
    fn verifies_hash_made_with_other_cost() {
        let old = cheap();
        let hash = old.hash("password123").unwrap();

        let new = Credentials::new(HashCost {
            memory_kib: 16,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(new.verify("password123", &hash));
    }

    #[test]
    fn malformed_hash_is_rejected() {
        let creds = cheap();
        assert!(!creds.verify("password123", "not-a-phc-string"));
    }

    #[test]
    fn absent_account_never_verifies() {
        let creds = cheap();
        assert!(!creds.verify_absent("feedback-dummy-password"));
    }

    #[test]
    fn invalid_cost_is_an_error() {
        let result = Credentials::new(HashCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(CredentialError::Params(_))));
    }
}
