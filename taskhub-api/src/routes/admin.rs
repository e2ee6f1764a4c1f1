/// System administration endpoints
///
/// - `DELETE /admin/revocations/:jti` - Lift a token revocation (system admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskhub_shared::{
    auth::{authorization::require_system_admin, middleware::AuthContext},
    models::user::User,
};

/// Result of an un-revocation
#[derive(Debug, Serialize, Deserialize)]
pub struct RevocationRemoved {
    pub jti: String,

    /// Whether a live revocation record was deleted
    pub removed: bool,
}

/// Removes a token id from the revocation store
///
/// Succeeds whether or not the id was revoked.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not a system administrator
pub async fn remove_revocation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(jti): Path<String>,
) -> ApiResult<Json<RevocationRemoved>> {
    let caller = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(ApiError::permission_denied)?;
    require_system_admin(&caller)?;

    let removed = state.revocations.remove(&jti).await;

    tracing::info!(
        user_id = auth.user_id,
        jti = %jti.chars().take(8).collect::<String>(),
        removed,
        "Revocation removed by administrator"
    );

    Ok(Json(RevocationRemoved { jti, removed }))
}
