//! Argon2id password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params,
    password_hash::{
        PasswordHash, PasswordHasher as ArgonHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use super::AccountError;

/// One-way password hashing used by the account preparers.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password with a fresh random salt.
    fn hash(&self, plaintext: &str) -> Result<String, AccountError>;

    /// Returns `Ok(true)` if `plaintext` matches `hash`, `Ok(false)` if not.
    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, AccountError>;
}

/// Argon2id hasher producing PHC strings.
#[derive(Clone, Default)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    /// Creates a hasher with the crate's default Argon2id parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a hasher with explicit cost parameters.
    ///
    /// Verification reads the parameters from the stored hash, so hashes made
    /// with other parameters still verify.
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, AccountError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AccountError::Hashing(format!("invalid Argon2 parameters: {e}")))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, argon2::Version::V0x13, params),
        })
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, plaintext: &str) -> Result<String, AccountError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| AccountError::Hashing(e.to_string()))?;

        Ok(hash.to_string())
    }

    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, AccountError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AccountError::Hashing(format!("invalid password hash format: {e}")))?;

        match self
            .argon2
            .verify_password(plaintext.as_bytes(), &parsed_hash)
        {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AccountError::Hashing(e.to_string())),
        }
    }
}

/// Cheap parameters so unit tests don't spend seconds hashing.
#[cfg(test)]
pub(crate) fn test_hasher() -> std::sync::Arc<dyn PasswordHasher> {
    std::sync::Arc::new(Argon2PasswordHasher::with_params(1024, 1, 1).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted_phc_string() {
        let hasher = test_hasher();
        let first = hasher.hash("secret").unwrap();
        let second = hasher.hash("secret").unwrap();

        assert!(first.starts_with("$argon2id$"));
        assert!(!first.contains("secret"));
        assert_ne!(first, second);
    }

    #[test]
    fn verify_matches_only_the_original() {
        let hasher = test_hasher();
        let hash = hasher.hash("secret").unwrap();

        assert!(hasher.verify("secret", &hash).unwrap());
        assert!(!hasher.verify("Secret", &hash).unwrap());
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        let hasher = test_hasher();
        assert!(matches!(
            hasher.verify("secret", "secret"),
            Err(AccountError::Hashing(_))
        ));
    }

    #[test]
    fn invalid_params_are_reported() {
        assert!(Argon2PasswordHasher::with_params(0, 0, 0).is_err());
    }
}
