/// Bearer token authentication for Axum
///
/// [`authenticate`] is the single place a request's credentials are checked:
///
/// 1. `Authorization: Bearer <token>` header present and well formed
/// 2. Signature, issuer, expiry and token type (`access`) valid
/// 3. Token id not revoked
///
/// The resulting [`AuthContext`] is stored in request extensions by the API's
/// auth layer and extracted by handlers with `Extension<AuthContext>`.
///
/// # Example
///
/// ```no_run
/// use axum::http::HeaderMap;
/// use taskhub_shared::auth::middleware::authenticate;
/// use taskhub_shared::auth::revocation::RevocationStore;
///
/// # async fn example(headers: HeaderMap) {
/// let revocations = RevocationStore::in_memory();
/// match authenticate(&headers, "jwt-secret", &revocations).await {
///     Ok(auth) => println!("user {}", auth.user_id),
///     Err(e) => println!("rejected: {}", e),
/// }
/// # }
/// ```

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::jwt::{revocation_ttl, validate_access_token, Claims, JwtError};
use super::revocation::RevocationStore;

/// Authentication context added to request extensions
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use taskhub_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("User: {}", auth.user_id)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: i64,

    /// Token ID of the access token used
    pub jti: String,

    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    /// Creates auth context from validated access token claims
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        let user_id = claims
            .user_id()
            .map_err(|_| AuthError::InvalidToken("Invalid subject".to_string()))?;

        Ok(Self {
            user_id,
            jti: claims.jti.clone(),
            expires_at: claims.expires_at(),
        })
    }

    /// Time left before the access token expires, zero once expired
    pub fn remaining_lifetime(&self) -> std::time::Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or_default()
    }

    /// Revocation TTL that covers the access token until validation rejects it
    pub fn revocation_ttl(&self) -> std::time::Duration {
        revocation_ttl(self.expires_at)
    }
}

/// Error type for authentication
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing credentials")]
    MissingCredentials,

    /// Invalid authorization header format
    #[error("{0}")]
    InvalidFormat(String),

    /// Token validation failed
    #[error("{0}")]
    InvalidToken(String),

    /// Token id is on the revocation list
    #[error("Token has been revoked")]
    Revoked,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidFormat(_) => "invalid_format",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::Revoked => "token_revoked",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    Ok(token)
}

/// Authenticates a request from its headers
///
/// # Errors
///
/// - `MissingCredentials` / `InvalidFormat` for a missing or malformed header
/// - `InvalidToken` for a bad signature, wrong issuer, wrong type or expiry
/// - `Revoked` if the token id has been revoked
pub async fn authenticate(
    headers: &HeaderMap,
    secret: &str,
    revocations: &RevocationStore,
) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;

    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
        _ => AuthError::InvalidToken(format!("Invalid token: {}", e)),
    })?;

    if revocations.is_revoked(&claims.jti).await {
        tracing::debug!(
            jti = %claims.jti.chars().take(8).collect::<String>(),
            "Rejected revoked token"
        );
        return Err(AuthError::Revoked);
    }

    AuthContext::from_claims(&claims)
}
