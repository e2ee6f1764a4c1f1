/// Task endpoints
///
/// - `GET /projects/:id/tasks` - Filtered, sorted, paginated listing (any project role)
/// - `POST /projects/:id/tasks` - Create a task (any project role)
/// - `GET /tasks/my` - Tasks assigned to the caller, across their projects
/// - `GET /tasks/all` - Tasks of every project the caller owns or belongs to
/// - `GET /tasks/:id` - Task details (any role in the task's project)
/// - `PATCH /tasks/:id` - Update (creator, assignee, or project owner/admin)
/// - `DELETE /tasks/:id` - Delete (creator, assignee, or project owner/admin)
///
/// Listing query parameters:
///
/// ```text
/// ?status=in_progress&priority=high&assigned_to=3&overdue=true
///  &sort=due_date&order=asc&page=2&per_page=50
/// ```
///
/// Assignees must be the project owner or a member.

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
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskhub_shared::{
    auth::{
        authorization::{require_project_access, require_task_access, require_task_modify},
        middleware::AuthContext,
    },
    models::{
        project::Project,
        project_member::ProjectMember,
        task::{
            CreateTask, SortOrder, Task, TaskFilter, TaskPriority, TaskScope, TaskSort,
            TaskSortField, TaskStatus, UpdateTask,
        },
        Pagination,
    },
};
use validator::Validate;

/// Flat query string for task listings
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<i64>,

    #[serde(default)]
    pub overdue: bool,

    #[serde(default)]
    pub sort: TaskSortField,

    #[serde(default)]
    pub order: SortOrder,

    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListTasksQuery {
    fn into_parts(self) -> (TaskFilter, TaskSort, Pagination) {
        let defaults = Pagination::default();

        (
            TaskFilter {
                status: self.status,
                priority: self.priority,
                assigned_to: self.assigned_to,
                overdue: self.overdue,
            },
            TaskSort {
                field: self.sort,
                order: self.order,
            },
            Pagination::new(
                self.page.unwrap_or(defaults.page),
                self.per_page.unwrap_or(defaults.per_page),
            ),
        )
    }
}

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    pub description: Option<String>,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: TaskPriority,

    #[validate(range(min = 0.0, message = "Estimated hours cannot be negative"))]
    pub estimated_hours: Option<f64>,

    pub assigned_to: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
}

impl CreateTaskRequest {
    /// Trims the title so length checks see what gets stored
    fn trimmed(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self
    }
}

/// Update task request
///
/// Omitted fields are left unchanged; `null` clears a nullable field.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0.0, message = "Estimated hours cannot be negative"))]
    pub estimated_hours: Option<Option<f64>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0.0, message = "Actual hours cannot be negative"))]
    pub actual_hours: Option<Option<f64>>,

    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: Option<i32>,

    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<i64>>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateTaskRequest {
    fn trimmed(mut self) -> Self {
        self.title = self.title.map(|title| title.trim().to_string());
        self
    }
}

impl From<UpdateTaskRequest> for UpdateTask {
    fn from(req: UpdateTaskRequest) -> Self {
        UpdateTask {
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            estimated_hours: req.estimated_hours,
            actual_hours: req.actual_hours,
            progress: req.progress,
            notes: req.notes,
            assigned_to: req.assigned_to,
            due_date: req.due_date,
        }
    }
}

/// Task with derived fields
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub task: Task,

    pub is_overdue: bool,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            is_overdue: task.is_overdue(),
            task,
        }
    }
}

async fn ensure_assignable(
    state: &AppState,
    project: &Project,
    assignee: Option<i64>,
) -> ApiResult<()> {
    let Some(user_id) = assignee else {
        return Ok(());
    };

    if user_id == project.owner_id || ProjectMember::exists(&state.db, project.id, user_id).await? {
        return Ok(());
    }

    Err(ApiError::invalid_field(
        "assigned_to",
        "Assignee must be a member of the project",
    ))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<i64>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Page<TaskResponse>>> {
    require_project_access(&state.access, project_id, auth.user_id).await?;

    let (filter, sort, pagination) = query.into_parts();
    let (tasks, total) =
        Task::list_by_project(&state.db, project_id, &filter, sort, pagination).await?;

    Ok(Json(Page::new(
        tasks.into_iter().map(TaskResponse::from).collect(),
        total,
        pagination,
    )))
}

async fn list_scoped(
    state: &AppState,
    scope: TaskScope,
    query: ListTasksQuery,
) -> ApiResult<Json<Page<TaskResponse>>> {
    let (mut filter, sort, pagination) = query.into_parts();
    if matches!(scope, TaskScope::AssignedTo(_)) {
        filter.assigned_to = None;
    }

    let (tasks, total) = Task::list(&state.db, scope, &filter, sort, pagination).await?;

    Ok(Json(Page::new(
        tasks.into_iter().map(TaskResponse::from).collect(),
        total,
        pagination,
    )))
}

pub async fn list_my_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Page<TaskResponse>>> {
    list_scoped(&state, TaskScope::AssignedTo(auth.user_id), query).await
}

pub async fn list_all_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Page<TaskResponse>>> {
    list_scoped(&state, TaskScope::VisibleTo(auth.user_id), query).await
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<i64>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let granted = require_project_access(&state.access, project_id, auth.user_id).await?;
    let req = req.trimmed();
    req.validate()?;
    ensure_assignable(&state, &granted.project, req.assigned_to).await?;

    let task = Task::create(
        &state.db,
        CreateTask {
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            estimated_hours: req.estimated_hours,
            project_id,
            assigned_to: req.assigned_to,
            created_by: auth.user_id,
            due_date: req.due_date,
        },
    )
    .await?;

    tracing::info!(task_id = task.id, project_id, user_id = auth.user_id, "Task created");

    Ok((StatusCode::CREATED, Json(task.into())))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<TaskResponse>> {
    let granted = require_task_access(&state.access, task_id, auth.user_id).await?;

    Ok(Json(granted.task.into()))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let task = require_task_modify(&state.access, task_id, auth.user_id).await?;
    let req = req.trimmed();
    req.validate()?;

    if let Some(Some(assignee)) = req.assigned_to {
        let project = Project::find_by_id(&state.db, task.project_id)
            .await?
            .ok_or_else(ApiError::permission_denied)?;
        ensure_assignable(&state, &project, Some(assignee)).await?;
    }

    let updated = Task::update(&state.db, task_id, req.into())
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    tracing::info!(
        task_id,
        project_id = updated.project_id,
        user_id = auth.user_id,
        status = updated.status.as_str(),
        "Task updated"
    );

    Ok(Json(updated.into()))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let task = require_task_modify(&state.access, task_id, auth.user_id).await?;

    if !Task::delete(&state.db, task_id).await? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    tracing::info!(task_id, project_id = task.project_id, user_id = auth.user_id, "Task deleted");

    Ok(StatusCode::NO_CONTENT)
}
