/// Project membership endpoints
///
/// - `GET /projects/:id/members` - Owner first, then members by join date (any role)
/// - `POST /projects/:id/members` - Add a user by email (owner or admin)
/// - `PATCH /projects/:id/members/:user_id` - Change a member's role (owner or admin)
/// - `DELETE /projects/:id/members/:user_id` - Remove a member (owner or admin)
///
/// The owner has no membership row and can be neither re-roled nor removed.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskhub_shared::{
    auth::{
        authorization::{require_member_manager, require_project_access},
        middleware::AuthContext,
    },
    models::{
        project_member::{CreateProjectMember, MemberRole, MemberWithUser, ProjectMember, ProjectRole},
        user::User,
    },
};
use validator::Validate;

/// One entry of the member listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberResponse {
    pub user_id: i64,
    pub email: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub role: ProjectRole,
    pub is_owner: bool,

    /// Project creation time for the owner
    pub joined_at: DateTime<Utc>,
}

impl MemberResponse {
    fn owner(user: User, since: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            username: user.username,
            avatar_url: user.avatar_url,
            role: ProjectRole::Owner,
            is_owner: true,
            joined_at: since,
        }
    }
}

impl From<MemberWithUser> for MemberResponse {
    fn from(member: MemberWithUser) -> Self {
        Self {
            user_id: member.user_id,
            email: member.email,
            username: member.username,
            avatar_url: member.avatar_url,
            role: member.role.into(),
            is_owner: false,
            joined_at: member.joined_at,
        }
    }
}

/// Add member request
#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default)]
    pub role: MemberRole,
}

/// Change member role request
#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: MemberRole,
}

fn owner_conflict() -> ApiError {
    ApiError::BadRequest("The project owner cannot be changed or removed".to_string())
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    let granted = require_project_access(&state.access, project_id, auth.user_id).await?;
    let project = granted.project;

    let owner = User::find_by_id(&state.db, project.owner_id)
        .await?
        .ok_or_else(|| ApiError::InternalError(format!("Owner of project {} missing", project.id)))?;

    let members = ProjectMember::list_by_project(&state.db, project_id).await?;

    let mut listing = Vec::with_capacity(members.len() + 1);
    listing.push(MemberResponse::owner(owner, project.created_at));
    listing.extend(
        members
            .into_iter()
            .filter(|m| m.user_id != project.owner_id)
            .map(MemberResponse::from),
    );

    Ok(Json(listing))
}

/// Adds a registered user to the project
///
/// # Errors
///
/// - `404 Not Found`: No user with that email
/// - `409 Conflict`: User is the owner or already a member
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<i64>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<MemberResponse>)> {
    let granted = require_member_manager(&state.access, project_id, auth.user_id).await?;
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if user.id == granted.project.owner_id {
        return Err(ApiError::Conflict(
            "Owner is already part of the project".to_string(),
        ));
    }

    if ProjectMember::exists(&state.db, project_id, user.id).await? {
        return Err(ApiError::Conflict(
            "User is already a member of this project".to_string(),
        ));
    }

    // A concurrent add still surfaces as 409 through the unique constraint
    let member = ProjectMember::create(
        &state.db,
        CreateProjectMember {
            project_id,
            user_id: user.id,
            role: req.role,
        },
    )
    .await?;

    tracing::info!(
        project_id,
        user_id = auth.user_id,
        member_id = user.id,
        role = member.role.as_str(),
        "Member added"
    );

    Ok((
        StatusCode::CREATED,
        Json(MemberResponse {
            user_id: user.id,
            email: user.email,
            username: user.username,
            avatar_url: user.avatar_url,
            role: member.role.into(),
            is_owner: false,
            joined_at: member.joined_at,
        }),
    ))
}

pub async fn update_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, member_id)): Path<(i64, i64)>,
    Json(req): Json<UpdateMemberRequest>,
) -> ApiResult<Json<ProjectMember>> {
    let granted = require_member_manager(&state.access, project_id, auth.user_id).await?;

    if member_id == granted.project.owner_id {
        return Err(owner_conflict());
    }

    let member = ProjectMember::update_role(&state.db, project_id, member_id, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    tracing::info!(
        project_id,
        user_id = auth.user_id,
        member_id,
        role = member.role.as_str(),
        "Member role changed"
    );

    Ok(Json(member))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, member_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let granted = require_member_manager(&state.access, project_id, auth.user_id).await?;

    if member_id == granted.project.owner_id {
        return Err(owner_conflict());
    }

    if !ProjectMember::delete(&state.db, project_id, member_id).await? {
        return Err(ApiError::NotFound("Member not found".to_string()));
    }

    tracing::info!(project_id, user_id = auth.user_id, member_id, "Member removed");

    Ok(StatusCode::NO_CONTENT)
}
