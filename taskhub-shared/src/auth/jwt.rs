/// JWT token generation and validation module
///
/// Tokens are signed using HS256 (HMAC-SHA256). Every token carries a unique
/// `jti` (UUID v4) so it can be revoked individually on logout.
///
/// # Token Types
///
/// - **Access Token**: Short-lived (1h by default), used for API authentication
/// - **Refresh Token**: Long-lived (30d by default), used to obtain new access tokens
///
/// # Example
///
/// ```
/// use taskhub_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let claims = Claims::new(42, TokenType::Access);
/// let token = create_token(&claims, "your-secret-key")?;
///
/// let validated = validate_token(&token, "your-secret-key")?;
/// assert_eq!(validated.user_id()?, 42);
/// assert_eq!(validated.jti, claims.jti);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer embedded in and required from every token
pub const ISSUER: &str = "taskhub";

/// Clock skew tolerated on `exp` and `nbf`
///
/// [`revocation_ttl`] adds this to every revocation, keep them in step.
pub const LEEWAY_SECS: u64 = 0;

/// How long a revocation must live to cover a token expiring at `expires_at`
///
/// Validation works in whole seconds and still accepts a token whose `exp`
/// equals the current second, so the token is honored until one second past
/// `exp` plus [`LEEWAY_SECS`]. Never shorter than one second.
pub fn revocation_ttl(expires_at: DateTime<Utc>) -> std::time::Duration {
    let accepted_until = expires_at + Duration::seconds(1 + LEEWAY_SECS as i64);

    (accepted_until - Utc::now())
        .to_std()
        .unwrap_or_default()
        .max(std::time::Duration::from_secs(1))
}

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Invalid token format
    #[error("Invalid token format: {0}")]
    InvalidFormat(String),

    /// Invalid issuer
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Access token
    Access,

    /// Refresh token
    Refresh,
}

impl TokenType {
    /// Gets default expiration duration for token type
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(1),
            TokenType::Refresh => Duration::days(30),
        }
    }

    /// Gets token type as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims structure
///
/// `sub` holds the user id as a string (RFC 7519 requires StringOrURI);
/// use [`Claims::user_id`] to read it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: String,

    /// Issuer - Always "taskhub"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Unique token identifier, the revocation key
    pub jti: String,

    /// Token type (custom claim)
    pub token_type: TokenType,
}

impl Claims {
    /// Creates new claims with the default expiration for the token type
    pub fn new(user_id: i64, token_type: TokenType) -> Self {
        Self::with_expiration(user_id, token_type, token_type.default_expiration())
    }

    /// Creates claims with custom expiration
    ///
    /// # Example
    ///
    /// ```
    /// use taskhub_shared::auth::jwt::{Claims, TokenType};
    /// use chrono::Duration;
    ///
    /// let claims = Claims::with_expiration(1, TokenType::Access, Duration::minutes(15));
    /// assert!(!claims.is_expired());
    /// ```
    pub fn with_expiration(user_id: i64, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            sub: user_id.to_string(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type,
        }
    }

    /// Parses the subject back into a user id
    pub fn user_id(&self) -> Result<i64, JwtError> {
        self.sub
            .parse()
            .map_err(|_| JwtError::InvalidFormat(format!("subject is not a user id: {}", self.sub)))
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Time until `exp`, floored at zero
    pub fn remaining_lifetime(&self) -> std::time::Duration {
        let remaining = self.exp - Utc::now().timestamp();
        std::time::Duration::from_secs(remaining.max(0) as u64)
    }

    /// Revocation TTL that outlasts validation of this token
    pub fn revocation_ttl(&self) -> std::time::Duration {
        revocation_ttl(self.expires_at())
    }
}

/// Creates a JWT token from claims
///
/// Signs the token using HS256 with the provided secret. The secret should be
/// at least 32 bytes; the API server refuses to start with a shorter one.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a JWT token and extracts claims
///
/// Verifies:
/// - Signature is valid
/// - Token hasn't expired
/// - Issuer is "taskhub"
/// - Token is not used before nbf time
///
/// Revocation is *not* checked here; see
/// [`RevocationStore`](super::revocation::RevocationStore).
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = LEEWAY_SECS;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
            expected: ISSUER.to_string(),
        },
        jsonwebtoken::errors::ErrorKind::InvalidToken => {
            JwtError::InvalidFormat(format!("Malformed token: {}", e))
        }
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

/// Validates token and checks it's an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != TokenType::Access {
        return Err(JwtError::ValidationError(
            "Expected access token, got refresh token".to_string(),
        ));
    }

    Ok(claims)
}

/// Validates token and checks it's a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != TokenType::Refresh {
        return Err(JwtError::ValidationError(
            "Expected refresh token, got access token".to_string(),
        ));
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_token_type_expiration() {
        assert_eq!(TokenType::Access.default_expiration(), Duration::hours(1));
        assert_eq!(TokenType::Refresh.default_expiration(), Duration::days(30));
    }

    #[test]
    fn test_claims_creation() {
        let claims = Claims::new(5, TokenType::Access);

        assert_eq!(claims.sub, "5");
        assert_eq!(claims.user_id().unwrap(), 5);
        assert_eq!(claims.iss, "taskhub");
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(Uuid::parse_str(&claims.jti).is_ok());
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_every_token_gets_its_own_jti() {
        let a = Claims::new(1, TokenType::Access);
        let b = Claims::new(1, TokenType::Access);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_remaining_lifetime() {
        let claims = Claims::with_expiration(1, TokenType::Access, Duration::hours(1));
        let left = claims.remaining_lifetime().as_secs();
        assert!(left > 3500);
        assert!(left <= 3600);

        let expired = Claims::with_expiration(1, TokenType::Access, Duration::seconds(-30));
        assert_eq!(expired.remaining_lifetime().as_secs(), 0);
    }

    #[test]
    fn test_user_id_rejects_non_numeric_subject() {
        let mut claims = Claims::new(1, TokenType::Access);
        claims.sub = "not-a-number".to_string();
        assert!(matches!(claims.user_id(), Err(JwtError::InvalidFormat(_))));
    }

    #[test]
    fn test_create_and_validate_token() {
        let claims = Claims::new(9, TokenType::Access);
        let token = create_token(&claims, SECRET).expect("Should create token");

        let validated = validate_token(&token, SECRET).expect("Should validate token");
        assert_eq!(validated.user_id().unwrap(), 9);
        assert_eq!(validated.jti, claims.jti);
        assert_eq!(validated.exp, claims.exp);
        assert_eq!(validated.token_type, TokenType::Access);
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let claims = Claims::new(1, TokenType::Access);
        let token = create_token(&claims, SECRET).unwrap();

        assert!(validate_token(&token, "another-secret-key-of-sufficient-size").is_err());
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = Claims::with_expiration(1, TokenType::Access, Duration::seconds(-3600));
        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).unwrap();
        let result = validate_token(&token, SECRET);
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_recently_expired_token_rejected() {
        // Two seconds past exp is inside jsonwebtoken's default 60s leeway
        let claims = Claims::with_expiration(1, TokenType::Access, Duration::seconds(-2));
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_revocation_ttl_outlasts_validation() {
        let claims = Claims::with_expiration(1, TokenType::Access, Duration::minutes(10));
        let ttl = claims.revocation_ttl();

        assert!(ttl > claims.remaining_lifetime());
        assert!(ttl.as_secs() >= 599 + LEEWAY_SECS);
        assert!(ttl.as_secs() <= 601 + LEEWAY_SECS);

        let expired = Claims::with_expiration(1, TokenType::Access, Duration::seconds(-30));
        assert_eq!(expired.revocation_ttl(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_validate_garbage_token() {
        assert!(validate_token("not.a.jwt", SECRET).is_err());
        assert!(validate_token("", SECRET).is_err());
    }

    #[test]
    fn test_validate_access_token() {
        let access = create_token(&Claims::new(1, TokenType::Access), SECRET).unwrap();
        assert!(validate_access_token(&access, SECRET).is_ok());

        let refresh = create_token(&Claims::new(1, TokenType::Refresh), SECRET).unwrap();
        assert!(validate_access_token(&refresh, SECRET).is_err());
    }

    #[test]
    fn test_validate_refresh_token() {
        let refresh = create_token(&Claims::new(1, TokenType::Refresh), SECRET).unwrap();
        assert!(validate_refresh_token(&refresh, SECRET).is_ok());

        let access = create_token(&Claims::new(1, TokenType::Access), SECRET).unwrap();
        assert!(validate_refresh_token(&access, SECRET).is_err());
    }
}
