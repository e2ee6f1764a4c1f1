/// Project tags
///
/// Tags are scoped to one project; names are unique within it
/// (`tags_project_name_key`). A tag can only be attached to tasks of its own
/// project, and deleting a tag detaches it everywhere.
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::models::tag::{CreateTag, Tag};
/// use taskhub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let bug = Tag::create(&pool, CreateTag {
///     project_id: 7,
///     name: "bug".to_string(),
///     color: "#ef4444".to_string(),
/// }).await?;
///
/// let added = Tag::attach(&pool, 7, 42, &[bug.id]).await?;
/// assert_eq!(added, vec![bug.id]);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

/// Color given to tags created without one
pub const DEFAULT_COLOR: &str = "#667eea";

/// Palette offered to clients
pub const PALETTE: [&str; 10] = [
    "#ef4444", "#f97316", "#eab308", "#22c55e", "#3b82f6", "#8b5cf6", "#ec4899", "#6b7280",
    "#14b8a6", "#f43f5e",
];

/// `#rrggbb`
pub fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Tag record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

/// Tag with the number of tasks carrying it
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TagWithCount {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub tag: Tag,

    pub task_count: i64,
}

/// Input for creating a tag
#[derive(Debug, Clone)]
pub struct CreateTag {
    pub project_id: i64,
    pub name: String,
    pub color: String,
}

/// Partial tag update
#[derive(Debug, Clone, Default)]
pub struct UpdateTag {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl Tag {
    /// Creates a tag
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `tags_project_name_key` if the
    /// project already has a tag with that name.
    pub async fn create(pool: &PgPool, data: CreateTag) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (project_id, name, color)
            VALUES ($1, $2, $3)
            RETURNING id, project_id, name, color, created_at
            "#,
        )
        .bind(data.project_id)
        .bind(data.name)
        .bind(data.color)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            "SELECT id, project_id, name, color, created_at FROM tags WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// A project's tags by name, with task counts
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: i64,
    ) -> Result<Vec<TagWithCount>, sqlx::Error> {
        sqlx::query_as::<_, TagWithCount>(
            r#"
            SELECT t.id, t.project_id, t.name, t.color, t.created_at,
                   COUNT(tt.task_id) AS task_count
            FROM tags t
            LEFT JOIN task_tags tt ON tt.tag_id = t.id
            WHERE t.project_id = $1
            GROUP BY t.id
            ORDER BY t.name ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Tags attached to a task, by name
    pub async fn list_for_task(pool: &PgPool, task_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.project_id, t.name, t.color, t.created_at
            FROM tags t
            JOIN task_tags tt ON tt.tag_id = t.id
            WHERE tt.task_id = $1
            ORDER BY t.name ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }

    /// Applies a partial update; `None` if the tag does not exist
    pub async fn update(
        pool: &PgPool,
        id: i64,
        data: UpdateTag,
    ) -> Result<Option<Self>, sqlx::Error> {
        if data.name.is_none() && data.color.is_none() {
            return Self::find_by_id(pool, id).await;
        }

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE tags SET ");
        let mut fields = query.separated(", ");

        if let Some(name) = data.name {
            fields.push("name = ").push_bind_unseparated(name);
        }
        if let Some(color) = data.color {
            fields.push("color = ").push_bind_unseparated(color);
        }

        query.push(" WHERE id = ").push_bind(id);
        query.push(" RETURNING id, project_id, name, color, created_at");

        query.build_query_as::<Tag>().fetch_optional(pool).await
    }

    /// Deletes a tag and detaches it from every task
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Attaches tags to a task, returning the ids newly attached
    ///
    /// Ids that do not exist, belong to another project or are already
    /// attached are skipped.
    pub async fn attach(
        pool: &PgPool,
        project_id: i64,
        task_id: i64,
        tag_ids: &[i64],
    ) -> Result<Vec<i64>, sqlx::Error> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO task_tags (task_id, tag_id)
            SELECT $1, t.id FROM tags t
            WHERE t.id = ANY($2) AND t.project_id = $3
            ON CONFLICT DO NOTHING
            RETURNING tag_id
            "#,
        )
        .bind(task_id)
        .bind(tag_ids)
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Detaches a tag from a task, returning whether it was attached
    pub async fn detach(pool: &PgPool, task_id: i64, tag_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM task_tags WHERE task_id = $1 AND tag_id = $2")
            .bind(task_id)
            .bind(tag_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_hex_color() {
        assert!(is_hex_color(DEFAULT_COLOR));
        assert!(is_hex_color("#ABCdef"));
        assert!(PALETTE.iter().all(|c| is_hex_color(c)));

        assert!(!is_hex_color("667eea"));
        assert!(!is_hex_color("#667eeg"));
        assert!(!is_hex_color("#667ee"));
        assert!(!is_hex_color("#667eeaa"));
        assert!(!is_hex_color("#é67ee"));
    }
}
