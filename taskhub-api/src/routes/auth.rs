/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /auth/register` - Register a new user (the first user becomes system admin)
/// - `POST /auth/login` - Login and get access and refresh tokens; repeated
///   failures lock the email for a while
/// - `POST /auth/refresh` - Exchange a refresh token for a new access token
/// - `POST /auth/logout` - Revoke the current access token (and optionally a refresh token)
/// - `GET /auth/me` / `PATCH /auth/me` - Read or update the caller's profile
/// - `POST /auth/change-password` - Change the caller's password

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::rate_limit::client_key,
    routes::double_option,
};
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use taskhub_shared::{
    auth::{
        jwt::{self, Claims, TokenType},
        middleware::AuthContext,
        password,
    },
    models::{
        login_attempt::{LoginAttempt, RecordLoginAttempt},
        user::{CreateUser, UpdateProfile, User, UserRole},
    },
};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 2, max = 50, message = "Username must be 2-50 characters"))]
    pub username: String,

    /// Checked against the configured password policy
    #[validate(length(max = 128, message = "Password must be at most 128 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Department must be at most 100 characters"))]
    pub department: Option<String>,
}

/// Register response
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: User,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    pub user: User,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Logout request; the body is optional
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    /// Also revoked when it belongs to the caller
    pub refresh_token: Option<String>,
}

/// Message-only response
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// Profile update request
///
/// Omitted fields are left unchanged; `null` clears a nullable field.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 50, message = "Username must be 2-50 characters"))]
    pub username: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 500, message = "Avatar URL must be at most 500 characters"))]
    pub avatar_url: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100, message = "Department must be at most 100 characters"))]
    pub department: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100, message = "Position must be at most 100 characters"))]
    pub position: Option<Option<String>>,
}

impl From<UpdateProfileRequest> for UpdateProfile {
    fn from(req: UpdateProfileRequest) -> Self {
        UpdateProfile {
            username: req.username,
            avatar_url: req.avatar_url,
            bio: req.bio,
            department: req.department,
            position: req.position,
        }
    }
}

/// Change password request
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,

    #[validate(length(max = 128, message = "Password must be at most 128 characters"))]
    pub new_password: String,
}

fn issue_token(
    state: &AppState,
    user_id: i64,
    token_type: TokenType,
) -> ApiResult<String> {
    let ttl = match token_type {
        TokenType::Access => state.config.jwt.access_token_ttl(),
        TokenType::Refresh => state.config.jwt.refresh_token_ttl(),
    };

    let claims = Claims::with_expiration(user_id, token_type, ttl);
    Ok(jwt::create_token(&claims, state.jwt_secret())?)
}

async fn current_user(state: &AppState, auth: &AuthContext) -> ApiResult<User> {
    User::find_by_id(&state.db, auth.user_id).await?.ok_or_else(|| {
        tracing::warn!(user_id = auth.user_id, "Token valid but user not found");
        ApiError::NotFound("User not found".to_string())
    })
}

/// Registers a new user
///
/// ```text
/// POST /auth/register
///
/// { "email": "user@example.com", "username": "alice", "password": "..." }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email already registered
/// - `422 Unprocessable Entity`: Validation or password policy failure
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    req.validate()?;
    state.config.password.validate(&req.password)?;

    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;

    // Guarantees the system always has an administrator
    let role = if User::count(&state.db).await? == 0 {
        UserRole::Admin
    } else {
        UserRole::Member
    };

    let mut user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            username: req.username,
            password_hash,
            role,
        },
    )
    .await?;

    if let Some(department) = req.department {
        let profile = UpdateProfile {
            department: Some(Some(department)),
            ..Default::default()
        };
        if let Some(updated) = User::update_profile(&state.db, user.id, profile).await? {
            user = updated;
        }
    }

    tracing::info!(user_id = user.id, role = ?user.role, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user,
        }),
    ))
}

/// Logs in with email and password
///
/// Unknown email and wrong password produce the same 401. Every attempt is
/// recorded; once an email collects the configured number of failures
/// inside the lockout window, logins for it are refused before the password
/// is checked.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `403 Forbidden`: Account is disabled
/// - `429 Too Many Requests`: Account locked (`account_locked`, with `Retry-After`)
pub async fn login(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let policy = state.config.lockout.policy();
    let recent =
        LoginAttempt::recent_failures(&state.db, &req.email, Utc::now() - policy.window).await?;

    if let Some(remaining) = policy.remaining(&recent, Utc::now()) {
        tracing::warn!(failures = recent.failures, "Login attempt for locked account");
        return Err(ApiError::AccountLocked {
            retry_after: remaining.num_seconds().max(1) as u64,
        });
    }

    let ip_address = peer.map(|ConnectInfo(addr)| {
        client_key(&headers, Some(addr.ip()), &state.config.rate_limit.trusted_proxies)
    });
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = match User::find_by_email(&state.db, &req.email).await? {
        Some(user) => user,
        None => {
            tracing::warn!("Login attempt for unknown email");
            record_attempt(
                &state,
                RecordLoginAttempt::failure(&req.email, ip_address, "invalid_credentials"),
            )
            .await;
            return Err(invalid());
        }
    };

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::warn!(user_id = user.id, "Failed login attempt");
        record_attempt(
            &state,
            RecordLoginAttempt::failure(&req.email, ip_address, "invalid_credentials"),
        )
        .await;
        return Err(invalid());
    }

    if !user.is_active {
        tracing::warn!(user_id = user.id, "Inactive user login attempt");
        record_attempt(
            &state,
            RecordLoginAttempt::failure(&req.email, ip_address, "account_disabled"),
        )
        .await;
        return Err(ApiError::Forbidden("Account is disabled".to_string()));
    }

    record_attempt(&state, RecordLoginAttempt::success(&req.email, ip_address)).await;

    if let Err(e) = User::update_last_login(&state.db, user.id).await {
        tracing::error!(user_id = user.id, error = %e, "Failed to update last login");
    }

    let access_token = issue_token(&state, user.id, TokenType::Access)?;
    let refresh_token = issue_token(&state, user.id, TokenType::Refresh)?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt.access_token_ttl().num_seconds(),
        user,
    }))
}

/// Audit writes never fail the login itself
async fn record_attempt(state: &AppState, attempt: RecordLoginAttempt) {
    if let Err(e) = LoginAttempt::record(&state.db, attempt).await {
        tracing::error!(error = %e, "Failed to record login attempt");
    }
}

/// Exchanges a refresh token for a new access token
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid, expired or revoked refresh token, or the
///   user is missing or inactive
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    if state.revocations.is_revoked(&claims.jti).await {
        return Err(ApiError::TokenRevoked);
    }

    let user_id = claims.user_id()?;
    let user = User::find_by_id(&state.db, user_id).await?;

    match user {
        Some(user) if user.is_active => {}
        _ => return Err(ApiError::Unauthorized("Invalid or inactive user".to_string())),
    }

    let access_token = issue_token(&state, user_id, TokenType::Access)?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt.access_token_ttl().num_seconds(),
    }))
}

/// Revokes the access token used for this request
///
/// The revocation lives until validation would reject the token anyway. A refresh
/// token in the body is revoked too when it is valid and belongs to the
/// caller; anything else in that field is ignored.
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    body: Option<Json<LogoutRequest>>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .revocations
        .add(&auth.jti, Some(auth.revocation_ttl()))
        .await;

    let refresh_token = body.and_then(|Json(req)| req.refresh_token);
    if let Some(token) = refresh_token {
        match jwt::validate_refresh_token(&token, state.jwt_secret()) {
            Ok(claims) if claims.user_id().ok() == Some(auth.user_id) => {
                state.revocations.revoke_claims(&claims).await;
            }
            Ok(_) => {
                tracing::warn!(user_id = auth.user_id, "Logout with another user's refresh token");
            }
            Err(e) => {
                tracing::debug!(user_id = auth.user_id, error = %e, "Ignoring invalid refresh token on logout");
            }
        }
    }

    tracing::info!(user_id = auth.user_id, "User logged out");

    Ok(MessageResponse::new("Logout successful"))
}

/// Returns the caller's profile
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<User>> {
    Ok(Json(current_user(&state, &auth).await?))
}

/// Updates the caller's profile
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let changes = UpdateProfile::from(req);
    if changes.is_empty() {
        return Ok(Json(current_user(&state, &auth).await?));
    }

    let user = User::update_profile(&state.db, auth.user_id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = user.id, "User profile updated");

    Ok(Json(user))
}

/// Changes the caller's password after verifying the current one
///
/// # Errors
///
/// - `401 Unauthorized`: Current password is incorrect
/// - `422 Unprocessable Entity`: New password violates the policy
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    let user = current_user(&state, &auth).await?;

    if !password::verify_password(&req.current_password, &user.password_hash)? {
        return Err(ApiError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    state.config.password.validate(&req.new_password)?;

    let password_hash = password::hash_password(&req.new_password)?;
    User::update_password_hash(&state.db, user.id, &password_hash).await?;

    tracing::info!(user_id = user.id, "Password changed");

    Ok(MessageResponse::new("Password changed successfully"))
}
