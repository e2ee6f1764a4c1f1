/// Task comment endpoints
///
/// - `GET /tasks/:id/comments` - Comments oldest first (any role in the task's project)
/// - `POST /tasks/:id/comments` - Post a comment or a reply (any role in the task's project)
/// - `PATCH /comments/:id` - Edit (author only)
/// - `DELETE /comments/:id` - Delete with replies (author, or project owner/admin)
///
/// A comment on a task the caller cannot see answers 403 whether or not it
/// exists.

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
        access::TaskAccess, authorization::require_task_access, middleware::AuthContext,
    },
    models::comment::{Comment, CommentWithAuthor, CreateComment},
};
use validator::Validate;

/// Post comment request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Content must be 1-2000 characters"))]
    pub content: String,

    /// Comment on the same task being replied to
    pub parent_id: Option<i64>,
}

impl CreateCommentRequest {
    fn trimmed(mut self) -> Self {
        self.content = self.content.trim().to_string();
        self
    }
}

/// Edit comment request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Content must be 1-2000 characters"))]
    pub content: String,
}

impl UpdateCommentRequest {
    fn trimmed(mut self) -> Self {
        self.content = self.content.trim().to_string();
        self
    }
}

/// Comment listing
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentList {
    pub comments: Vec<CommentWithAuthor>,
}

/// Authors may always delete; project owners and admins moderate
fn can_delete(comment: &Comment, access: &TaskAccess, user_id: i64) -> bool {
    comment.user_id == user_id || access.role.is_admin()
}

/// Loads a comment together with the caller's access to its task
async fn comment_with_access(
    state: &AppState,
    comment_id: i64,
    user_id: i64,
) -> ApiResult<(Comment, TaskAccess)> {
    let comment = Comment::find_by_id(&state.db, comment_id)
        .await?
        .ok_or_else(ApiError::permission_denied)?;
    let access = require_task_access(&state.access, comment.task_id, user_id).await?;

    Ok((comment, access))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<CommentList>> {
    require_task_access(&state.access, task_id, auth.user_id).await?;

    let comments = Comment::list_by_task(&state.db, task_id).await?;

    Ok(Json(CommentList { comments }))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<i64>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let granted = require_task_access(&state.access, task_id, auth.user_id).await?;
    let req = req.trimmed();
    req.validate()?;

    if let Some(parent_id) = req.parent_id {
        let parent = Comment::find_by_id(&state.db, parent_id).await?;
        if parent.map(|p| p.task_id) != Some(task_id) {
            return Err(ApiError::invalid_field(
                "parent_id",
                "Parent comment must belong to the same task",
            ));
        }
    }

    let comment = Comment::create(
        &state.db,
        CreateComment {
            task_id,
            user_id: auth.user_id,
            parent_id: req.parent_id,
            content: req.content,
        },
    )
    .await?;

    tracing::info!(
        comment_id = comment.id,
        task_id,
        project_id = granted.task.project_id,
        user_id = auth.user_id,
        "Comment posted"
    );

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(comment_id): Path<i64>,
    Json(req): Json<UpdateCommentRequest>,
) -> ApiResult<Json<Comment>> {
    let (comment, _) = comment_with_access(&state, comment_id, auth.user_id).await?;

    if comment.user_id != auth.user_id {
        return Err(ApiError::Forbidden(
            "Only the author can edit a comment".to_string(),
        ));
    }

    let req = req.trimmed();
    req.validate()?;

    let updated = Comment::update_content(&state.db, comment_id, &req.content)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    tracing::info!(comment_id, task_id = updated.task_id, user_id = auth.user_id, "Comment edited");

    Ok(Json(updated))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(comment_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let (comment, access) = comment_with_access(&state, comment_id, auth.user_id).await?;

    if !can_delete(&comment, &access, auth.user_id) {
        return Err(ApiError::permission_denied());
    }

    if !Comment::delete(&state.db, comment_id).await? {
        return Err(ApiError::NotFound("Comment not found".to_string()));
    }

    tracing::info!(comment_id, task_id = comment.task_id, user_id = auth.user_id, "Comment deleted");

    Ok(StatusCode::NO_CONTENT)
}
