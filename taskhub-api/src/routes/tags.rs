/// Tag endpoints
///
/// - `GET /projects/:id/tags` - Tags with task counts, plus the color palette (any role)
/// - `POST /projects/:id/tags` - Create a tag (any role)
/// - `PATCH /tags/:id` - Rename or recolor (project owner or admin)
/// - `DELETE /tags/:id` - Delete and detach everywhere (project owner or admin)
/// - `GET /tasks/:id/tags` - Tags on a task (any role in the task's project)
/// - `POST /tasks/:id/tags` - Attach tags (creator, assignee, or project owner/admin)
/// - `DELETE /tasks/:id/tags/:tag_id` - Detach a tag (same as attaching)
///
/// Tag names are unique per project; a duplicate answers 409.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskhub_shared::{
    auth::{
        authorization::{
            require_project_access, require_project_admin, require_task_access,
            require_task_modify,
        },
        middleware::AuthContext,
    },
    models::tag::{is_hex_color, CreateTag, Tag, TagWithCount, UpdateTag, DEFAULT_COLOR, PALETTE},
};
use validator::Validate;

/// Create tag request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,

    /// `#rrggbb`, defaults to [`DEFAULT_COLOR`]
    pub color: Option<String>,
}

impl CreateTagRequest {
    fn trimmed(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self
    }
}

/// Update tag request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTagRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: Option<String>,

    pub color: Option<String>,
}

impl UpdateTagRequest {
    fn trimmed(mut self) -> Self {
        self.name = self.name.map(|name| name.trim().to_string());
        self
    }
}

/// Attach request: either one `tag_id` or a list of `tag_ids`
#[derive(Debug, Default, Deserialize)]
pub struct AttachTagsRequest {
    pub tag_id: Option<i64>,

    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

impl AttachTagsRequest {
    fn ids(&self) -> Vec<i64> {
        let mut ids = self.tag_ids.clone();
        ids.extend(self.tag_id);
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Project tag listing
#[derive(Debug, Serialize, Deserialize)]
pub struct TagList {
    pub tags: Vec<TagWithCount>,
    pub palette: Vec<String>,
}

/// Tags on a task after an attach
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskTags {
    /// Ids attached by this request
    pub added: Vec<i64>,

    pub tags: Vec<Tag>,
}

fn check_color(color: Option<&str>) -> ApiResult<()> {
    match color {
        Some(color) if !is_hex_color(color) => Err(ApiError::invalid_field(
            "color",
            "Color must be a hex value like #667eea",
        )),
        _ => Ok(()),
    }
}

async fn find_tag(state: &AppState, tag_id: i64) -> ApiResult<Tag> {
    Tag::find_by_id(&state.db, tag_id)
        .await?
        .ok_or_else(ApiError::permission_denied)
}

pub async fn list_tags(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<TagList>> {
    require_project_access(&state.access, project_id, auth.user_id).await?;

    let tags = Tag::list_by_project(&state.db, project_id).await?;

    Ok(Json(TagList {
        tags,
        palette: PALETTE.iter().map(|c| c.to_string()).collect(),
    }))
}

pub async fn create_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<i64>,
    Json(req): Json<CreateTagRequest>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    require_project_access(&state.access, project_id, auth.user_id).await?;
    let req = req.trimmed();
    req.validate()?;
    check_color(req.color.as_deref())?;

    let tag = Tag::create(
        &state.db,
        CreateTag {
            project_id,
            name: req.name,
            color: req.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        },
    )
    .await?;

    tracing::info!(tag_id = tag.id, project_id, user_id = auth.user_id, "Tag created");

    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn update_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(tag_id): Path<i64>,
    Json(req): Json<UpdateTagRequest>,
) -> ApiResult<Json<Tag>> {
    let tag = find_tag(&state, tag_id).await?;
    require_project_admin(&state.access, tag.project_id, auth.user_id).await?;
    let req = req.trimmed();
    req.validate()?;
    check_color(req.color.as_deref())?;

    let updated = Tag::update(
        &state.db,
        tag_id,
        UpdateTag {
            name: req.name,
            color: req.color,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Tag not found".to_string()))?;

    tracing::info!(tag_id, project_id = tag.project_id, user_id = auth.user_id, "Tag updated");

    Ok(Json(updated))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(tag_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let tag = find_tag(&state, tag_id).await?;
    require_project_admin(&state.access, tag.project_id, auth.user_id).await?;

    if !Tag::delete(&state.db, tag_id).await? {
        return Err(ApiError::NotFound("Tag not found".to_string()));
    }

    tracing::info!(tag_id, project_id = tag.project_id, user_id = auth.user_id, "Tag deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_task_tags(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<Vec<Tag>>> {
    require_task_access(&state.access, task_id, auth.user_id).await?;

    Ok(Json(Tag::list_for_task(&state.db, task_id).await?))
}

pub async fn attach_tags(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<i64>,
    Json(req): Json<AttachTagsRequest>,
) -> ApiResult<Json<TaskTags>> {
    let task = require_task_modify(&state.access, task_id, auth.user_id).await?;

    let ids = req.ids();
    if ids.is_empty() {
        return Err(ApiError::invalid_field("tag_ids", "tag_id or tag_ids is required"));
    }

    let added = Tag::attach(&state.db, task.project_id, task_id, &ids).await?;
    let tags = Tag::list_for_task(&state.db, task_id).await?;

    tracing::info!(
        task_id,
        project_id = task.project_id,
        user_id = auth.user_id,
        added = added.len(),
        "Tags attached"
    );

    Ok(Json(TaskTags { added, tags }))
}

pub async fn detach_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((task_id, tag_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let task = require_task_modify(&state.access, task_id, auth.user_id).await?;

    if !Tag::detach(&state.db, task_id, tag_id).await? {
        return Err(ApiError::NotFound("Tag is not attached to this task".to_string()));
    }

    tracing::info!(task_id, tag_id, project_id = task.project_id, user_id = auth.user_id, "Tag detached");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_ids_merge_single_and_list() {
        let req: AttachTagsRequest = serde_json::from_str(r#"{"tag_id": 4}"#).unwrap();
        assert_eq!(req.ids(), vec![4]);

        let req: AttachTagsRequest =
            serde_json::from_str(r#"{"tag_ids": [3, 1, 3], "tag_id": 1}"#).unwrap();
        assert_eq!(req.ids(), vec![1, 3]);

        assert!(AttachTagsRequest::default().ids().is_empty());
    }

    #[test]
    fn test_tag_request_validation() {
        let req: CreateTagRequest = serde_json::from_str(r#"{"name": "  "}"#).unwrap();
        assert!(req.trimmed().validate().is_err());

        let req: CreateTagRequest = serde_json::from_str(r#"{"name": " bug "}"#).unwrap();
        let req = req.trimmed();
        assert!(req.validate().is_ok());
        assert_eq!(req.name, "bug");
        assert!(req.color.is_none());

        let req = UpdateTagRequest {
            name: Some("x".repeat(51)),
            ..Default::default()
        };
        assert!(req.trimmed().validate().is_err());
    }

    #[test]
    fn test_check_color() {
        assert!(check_color(None).is_ok());
        assert!(check_color(Some("#22c55e")).is_ok());
        assert!(matches!(
            check_color(Some("green")),
            Err(ApiError::ValidationError(details)) if details[0].field == "color"
        ));
    }
}
