/// Project model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(100) NOT NULL,
///     description TEXT,
///     status VARCHAR(20) NOT NULL DEFAULT 'active',
///     owner_id BIGINT NOT NULL REFERENCES users (id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// `owner_id` is fixed at creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

/// Project record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,

    /// Free-form lifecycle label, `active` on creation
    pub status: String,

    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: i64,
}

/// Partial project update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<String>,
}

/// Project as listed for a particular user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,

    /// `owner`, `admin` or `member`
    pub role: String,

    pub task_count: i64,
}

/// Aggregate task and membership counts for a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectStats {
    pub total_tasks: i64,
    pub todo_tasks: i64,
    pub in_progress_tasks: i64,
    pub review_tasks: i64,
    pub done_tasks: i64,
    pub overdue_tasks: i64,

    /// Members including the owner
    pub member_count: i64,

    /// Percentage of tasks that are done, 0.0 for an empty project
    #[sqlx(skip)]
    pub completion_rate: f64,
}

impl ProjectStats {
    fn with_completion_rate(mut self) -> Self {
        self.completion_rate = if self.total_tasks > 0 {
            let rate = self.done_tasks as f64 * 100.0 / self.total_tasks as f64;
            (rate * 100.0).round() / 100.0
        } else {
            0.0
        };
        self
    }
}

impl Project {
    /// Creates a project owned by `data.owner_id`
    pub async fn create(pool: &PgPool, data: CreateProject) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (name, description, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, status, owner_id, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.description)
        .bind(data.owner_id)
        .fetch_one(pool)
        .await
    }

    /// Finds a project by ID
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, description, status, owner_id, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Lists projects the user owns or belongs to, newest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ProjectSummary>, sqlx::Error> {
        sqlx::query_as::<_, ProjectSummary>(
            r#"
            SELECT p.id, p.name, p.description, p.status, p.owner_id, p.created_at, p.updated_at,
                   CASE WHEN p.owner_id = $1 THEN 'owner' ELSE pm.role::TEXT END AS role,
                   (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id) AS task_count
            FROM projects p
            LEFT JOIN project_members pm ON pm.project_id = p.id AND pm.user_id = $1
            WHERE p.owner_id = $1 OR pm.user_id IS NOT NULL
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Counts projects the user owns or belongs to
    pub async fn count_for_user(pool: &PgPool, user_id: i64) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM projects p
            LEFT JOIN project_members pm ON pm.project_id = p.id AND pm.user_id = $1
            WHERE p.owner_id = $1 OR pm.user_id IS NOT NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Applies a partial update
    pub async fn update(
        pool: &PgPool,
        id: i64,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE projects SET updated_at = NOW()");

        if let Some(name) = data.name {
            query.push(", name = ").push_bind(name);
        }
        if let Some(description) = data.description {
            query.push(", description = ").push_bind(description);
        }
        if let Some(status) = data.status {
            query.push(", status = ").push_bind(status);
        }

        query.push(" WHERE id = ").push_bind(id);
        query.push(" RETURNING id, name, description, status, owner_id, created_at, updated_at");

        query.build_query_as::<Project>().fetch_optional(pool).await
    }

    /// Deletes a project; members and tasks cascade
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Task counts per status plus membership size
    pub async fn stats(pool: &PgPool, id: i64) -> Result<ProjectStats, sqlx::Error> {
        let stats = sqlx::query_as::<_, ProjectStats>(
            r#"
            SELECT
                COUNT(t.id) AS total_tasks,
                COUNT(t.id) FILTER (WHERE t.status = 'todo') AS todo_tasks,
                COUNT(t.id) FILTER (WHERE t.status = 'in_progress') AS in_progress_tasks,
                COUNT(t.id) FILTER (WHERE t.status = 'review') AS review_tasks,
                COUNT(t.id) FILTER (WHERE t.status = 'done') AS done_tasks,
                COUNT(t.id) FILTER (WHERE t.status <> 'done' AND t.due_date < NOW()) AS overdue_tasks,
                1 + (SELECT COUNT(*) FROM project_members pm WHERE pm.project_id = $1) AS member_count
            FROM tasks t
            WHERE t.project_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(stats.with_completion_rate())
    }
}
