/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and password policy
/// - [`jwt`]: JWT token generation and validation
/// - [`revocation`]: Revoked-token store with a Redis primary and in-memory fallback
/// - [`access`]: Project and task access resolution
/// - [`authorization`]: `Result`-returning guards built on [`access`]
/// - [`middleware`]: Bearer token extraction for request handlers
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use taskhub_shared::auth::revocation::RevocationStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-key-that-is-at-least-32-bytes";
/// let token = create_token(&Claims::new(7, TokenType::Access), secret)?;
/// let claims = validate_access_token(&token, secret)?;
///
/// let revocations = RevocationStore::in_memory();
/// revocations.revoke_claims(&claims).await;
/// assert!(revocations.is_revoked(&claims.jti).await);
/// # Ok(())
/// # }
/// ```

pub mod access;
pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod revocation;
