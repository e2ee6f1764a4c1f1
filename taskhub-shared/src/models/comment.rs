/// Task comments
///
/// Comments belong to a task and are visible to everyone with access to the
/// task's project. A comment may reply to another comment on the same task;
/// deleting a comment deletes its replies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

const COLUMNS: &str = "id, task_id, user_id, parent_id, content, is_edited, created_at, updated_at";

/// Comment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub task_id: i64,

    /// Author
    pub user_id: i64,

    pub parent_id: Option<i64>,
    pub content: String,

    /// Set once the content has been changed after posting
    pub is_edited: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment joined with the author's username
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub comment: Comment,

    pub username: String,
}

/// Input for posting a comment
#[derive(Debug, Clone)]
pub struct CreateComment {
    pub task_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
}

impl Comment {
    pub async fn create(pool: &PgPool, data: CreateComment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO task_comments (task_id, user_id, parent_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(data.task_id)
        .bind(data.user_id)
        .bind(data.parent_id)
        .bind(data.content)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!("SELECT {COLUMNS} FROM task_comments WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// A task's comments with author names, oldest first
    pub async fn list_by_task(
        pool: &PgPool,
        task_id: i64,
    ) -> Result<Vec<CommentWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT c.id, c.task_id, c.user_id, c.parent_id, c.content, c.is_edited,
                   c.created_at, c.updated_at, u.username
            FROM task_comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.task_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }

    /// Replaces the content and marks the comment edited
    pub async fn update_content(
        pool: &PgPool,
        id: i64,
        content: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            UPDATE task_comments
            SET content = $2, is_edited = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(content)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a comment and its replies, returning whether a row was removed
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM task_comments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
