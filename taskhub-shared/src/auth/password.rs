/// Password hashing and password policy
///
/// Hashes use Argon2id (64 MB memory, 3 passes, 4 lanes, 32-byte output) in
/// PHC string format, so parameters travel with the hash and verification
/// needs no configuration.
///
/// # Example
///
/// ```
/// use taskhub_shared::auth::password::{hash_password, verify_password, PasswordPolicy};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// PasswordPolicy::default().validate("correct horse")?;
///
/// let hash = hash_password("correct horse")?;
/// assert!(verify_password("correct horse", &hash)?);
/// assert!(!verify_password("battery staple", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use serde::{Deserialize, Serialize};

/// Characters accepted as "special" by [`PasswordPolicy`]
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// Password does not satisfy the configured policy
    #[error("{0}")]
    PolicyViolation(String),
}

/// Configurable password strength rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordPolicy {
    /// Minimum length in characters
    pub min_length: usize,

    /// Require at least one uppercase letter
    pub require_uppercase: bool,

    /// Require at least one ASCII digit
    pub require_numbers: bool,

    /// Require at least one of [`SPECIAL_CHARACTERS`]
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: false,
            require_numbers: false,
            require_special: false,
        }
    }
}

impl PasswordPolicy {
    /// Checks a candidate password, reporting the first rule it breaks
    pub fn validate(&self, password: &str) -> Result<(), PasswordError> {
        if password.chars().count() < self.min_length {
            return Err(PasswordError::PolicyViolation(format!(
                "Password must be at least {} characters long",
                self.min_length
            )));
        }

        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(PasswordError::PolicyViolation(
                "Password must contain at least one uppercase letter".to_string(),
            ));
        }

        if self.require_numbers && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordError::PolicyViolation(
                "Password must contain at least one number".to_string(),
            ));
        }

        if self.require_special && !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
            return Err(PasswordError::PolicyViolation(
                "Password must contain at least one special character".to_string(),
            ));
        }

        Ok(())
    }
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(65536) // 64 MB
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password using Argon2id with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored PHC hash in constant time
///
/// `Ok(false)` means the password is wrong; `Err` means the stored hash is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}
