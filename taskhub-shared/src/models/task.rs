/// Task model and database operations
///
/// Tasks always belong to exactly one project and every access decision about
/// a task is made against that project.
///
/// # Status
///
/// ```text
/// todo → in_progress → review → done
/// ```
///
/// Any status may be set directly. Entering `done` stamps `completed_at`;
/// leaving `done` clears it.
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::models::task::{CreateTask, Task, TaskFilter, TaskPriority};
/// use taskhub_shared::models::Pagination;
/// use taskhub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let task = Task::create(&pool, CreateTask {
///     title: "Write release notes".to_string(),
///     priority: TaskPriority::High,
///     project_id: 7,
///     created_by: 1,
///     ..Default::default()
/// }).await?;
///
/// let (tasks, total) = Task::list_by_project(
///     &pool,
///     task.project_id,
///     &TaskFilter::default(),
///     Default::default(),
///     Pagination::default(),
/// ).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::Pagination;

const COLUMNS: &str = "id, title, description, status, priority, estimated_hours, actual_hours, \
     progress, notes, project_id, assigned_to, created_by, due_date, completed_at, \
     created_at, updated_at";

/// Workflow status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

/// Task priority; the database enum orders `low < medium < high`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Task record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,

    /// 0 to 100
    pub progress: i32,

    pub notes: Option<String>,
    pub project_id: i64,
    pub assigned_to: Option<i64>,
    pub created_by: i64,
    pub due_date: Option<DateTime<Utc>>,

    /// Set while the task is `done`
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Whether the task is past its due date and not finished
    pub fn is_overdue(&self) -> bool {
        self.status != TaskStatus::Done && self.due_date.is_some_and(|due| due < Utc::now())
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub estimated_hours: Option<f64>,
    pub project_id: i64,
    pub assigned_to: Option<i64>,
    pub created_by: i64,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial task update
///
/// Outer `None` leaves a field unchanged; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub estimated_hours: Option<Option<f64>>,
    pub actual_hours: Option<Option<f64>>,
    pub progress: Option<i32>,
    pub notes: Option<Option<String>>,
    pub assigned_to: Option<Option<i64>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Filters for listing a project's tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<i64>,

    /// `true` keeps only unfinished tasks past their due date
    #[serde(default)]
    pub overdue: bool,
}

/// Sort key for task listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSortField {
    #[default]
    CreatedAt,
    DueDate,
    Priority,
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Listing order, newest first by default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSort {
    #[serde(default)]
    pub field: TaskSortField,
    #[serde(default)]
    pub order: SortOrder,
}

impl TaskSort {
    fn order_by(&self) -> &'static str {
        match (self.field, self.order) {
            (TaskSortField::CreatedAt, SortOrder::Asc) => " ORDER BY created_at ASC, id ASC",
            (TaskSortField::CreatedAt, SortOrder::Desc) => " ORDER BY created_at DESC, id DESC",
            (TaskSortField::DueDate, SortOrder::Asc) => " ORDER BY due_date ASC NULLS LAST, id ASC",
            (TaskSortField::DueDate, SortOrder::Desc) => {
                " ORDER BY due_date DESC NULLS LAST, id DESC"
            }
            (TaskSortField::Priority, SortOrder::Asc) => " ORDER BY priority ASC, id ASC",
            (TaskSortField::Priority, SortOrder::Desc) => " ORDER BY priority DESC, id DESC",
        }
    }
}

/// Which tasks a listing draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    /// One project's tasks
    Project(i64),

    /// Tasks assigned to the user in projects they own or belong to
    AssignedTo(i64),

    /// Every task in projects the user owns or belongs to
    VisibleTo(i64),
}

fn push_visible_projects(query: &mut QueryBuilder<'_, Postgres>, user_id: i64) {
    query
        .push(" project_id IN (SELECT id FROM projects WHERE owner_id = ")
        .push_bind(user_id)
        .push(" UNION SELECT project_id FROM project_members WHERE user_id = ")
        .push_bind(user_id)
        .push(")");
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, scope: TaskScope, filter: &TaskFilter) {
    match scope {
        TaskScope::Project(project_id) => {
            query.push(" WHERE project_id = ").push_bind(project_id);
        }
        TaskScope::AssignedTo(user_id) => {
            query.push(" WHERE assigned_to = ").push_bind(user_id);
            query.push(" AND");
            push_visible_projects(query, user_id);
        }
        TaskScope::VisibleTo(user_id) => {
            query.push(" WHERE");
            push_visible_projects(query, user_id);
        }
    }

    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        query.push(" AND priority = ").push_bind(priority);
    }
    if let Some(assigned_to) = filter.assigned_to {
        query.push(" AND assigned_to = ").push_bind(assigned_to);
    }
    if filter.overdue {
        query.push(" AND status <> 'done' AND due_date < NOW()");
    }
}

impl Task {
    /// Creates a task
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let completed_at = (data.status == TaskStatus::Done).then(Utc::now);

        sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (title, description, status, priority, estimated_hours,
                               project_id, assigned_to, created_by, due_date, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.estimated_hours)
        .bind(data.project_id)
        .bind(data.assigned_to)
        .bind(data.created_by)
        .bind(data.due_date)
        .bind(completed_at)
        .fetch_one(pool)
        .await
    }

    /// Finds a task by ID
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists a project's tasks with filtering, sorting and pagination
    ///
    /// Returns the page and the total number of matching tasks.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: i64,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Pagination,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        Self::list(pool, TaskScope::Project(project_id), filter, sort, page).await
    }

    /// Lists tasks from any scope; cross-project scopes only reach projects
    /// the user owns or belongs to
    pub async fn list(
        pool: &PgPool,
        scope: TaskScope,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Pagination,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM tasks");
        push_filter(&mut count, scope, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM tasks"));
        push_filter(&mut query, scope, filter);
        query.push(sort.order_by());
        query.push(" LIMIT ").push_bind(page.limit());
        query.push(" OFFSET ").push_bind(page.offset());

        let tasks = query.build_query_as::<Task>().fetch_all(pool).await?;

        Ok((tasks, total))
    }

    /// Applies a partial update, maintaining `completed_at`
    pub async fn update(
        pool: &PgPool,
        id: i64,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE tasks SET updated_at = NOW()");

        if let Some(title) = data.title {
            query.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            query.push(", description = ").push_bind(description);
        }
        if let Some(status) = data.status {
            query.push(", status = ").push_bind(status);
            if status == TaskStatus::Done {
                query.push(", completed_at = COALESCE(completed_at, NOW())");
            } else {
                query.push(", completed_at = NULL");
            }
        }
        if let Some(priority) = data.priority {
            query.push(", priority = ").push_bind(priority);
        }
        if let Some(estimated_hours) = data.estimated_hours {
            query.push(", estimated_hours = ").push_bind(estimated_hours);
        }
        if let Some(actual_hours) = data.actual_hours {
            query.push(", actual_hours = ").push_bind(actual_hours);
        }
        if let Some(progress) = data.progress {
            query.push(", progress = ").push_bind(progress);
        }
        if let Some(notes) = data.notes {
            query.push(", notes = ").push_bind(notes);
        }
        if let Some(assigned_to) = data.assigned_to {
            query.push(", assigned_to = ").push_bind(assigned_to);
        }
        if let Some(due_date) = data.due_date {
            query.push(", due_date = ").push_bind(due_date);
        }

        query.push(" WHERE id = ").push_bind(id);
        query.push(format!(" RETURNING {COLUMNS}"));

        query.build_query_as::<Task>().fetch_optional(pool).await
    }

    /// Deletes a task, returning whether a row was removed
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
