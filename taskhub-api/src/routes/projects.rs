/// Project endpoints
///
/// - `GET /projects` - Projects the caller owns or belongs to
/// - `POST /projects` - Create a project; the caller becomes its owner
/// - `GET /projects/:id` - Project details and the caller's role (any role)
/// - `PATCH /projects/:id` - Update (owner or admin)
/// - `DELETE /projects/:id` - Delete with all members and tasks (owner only)
/// - `GET /projects/:id/stats` - Task and member counts (any role)
///
/// A project the caller cannot see answers 403 whether or not it exists.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{double_option, Page},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskhub_shared::{
    auth::{
        authorization::{require_project_access, require_project_admin, require_project_owner},
        middleware::AuthContext,
    },
    models::{
        project::{CreateProject, Project, ProjectStats, ProjectSummary, UpdateProject},
        project_member::ProjectRole,
        Pagination,
    },
};
use validator::Validate;

/// Create project request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
}

impl CreateProjectRequest {
    /// Trims the name so length checks see what gets stored
    fn trimmed(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self
    }
}

/// Update project request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<Option<String>>,

    #[validate(length(min = 1, max = 20, message = "Status must be 1-20 characters"))]
    pub status: Option<String>,
}

impl UpdateProjectRequest {
    fn trimmed(mut self) -> Self {
        self.name = self.name.map(|name| name.trim().to_string());
        self
    }
}

/// Project with the caller's role
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectResponse {
    #[serde(flatten)]
    pub project: Project,

    pub role: ProjectRole,
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Page<ProjectSummary>>> {
    let projects = Project::list_for_user(
        &state.db,
        auth.user_id,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    let total = Project::count_for_user(&state.db, auth.user_id).await?;

    Ok(Json(Page::new(projects, total, pagination)))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectResponse>)> {
    let req = req.trimmed();
    req.validate()?;

    let project = Project::create(
        &state.db,
        CreateProject {
            name: req.name,
            description: req.description,
            owner_id: auth.user_id,
        },
    )
    .await?;

    tracing::info!(project_id = project.id, user_id = auth.user_id, "Project created");

    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse {
            project,
            role: ProjectRole::Owner,
        }),
    ))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<ProjectResponse>> {
    let granted = require_project_access(&state.access, project_id, auth.user_id).await?;

    Ok(Json(ProjectResponse {
        project: granted.project,
        role: granted.role,
    }))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<i64>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    let granted = require_project_admin(&state.access, project_id, auth.user_id).await?;
    let req = req.trimmed();
    req.validate()?;

    let changes = UpdateProject {
        name: req.name,
        description: req.description,
        status: req.status,
    };

    let project = Project::update(&state.db, project_id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    tracing::info!(project_id, user_id = auth.user_id, "Project updated");

    Ok(Json(ProjectResponse {
        project,
        role: granted.role,
    }))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_project_owner(&state.access, project_id, auth.user_id).await?;

    if !Project::delete(&state.db, project_id).await? {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }

    tracing::info!(project_id, user_id = auth.user_id, "Project deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn project_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<ProjectStats>> {
    require_project_access(&state.access, project_id, auth.user_id).await?;

    Ok(Json(Project::stats(&state.db, project_id).await?))
}
