/// Project membership model and project roles
///
/// A project's owner is recorded only in `projects.owner_id` and never gets a
/// `project_members` row; everyone else who participates in a project has
/// exactly one row here.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE project_members (
///     id BIGSERIAL PRIMARY KEY,
///     project_id BIGINT NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
///     user_id BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
///     role member_role NOT NULL DEFAULT 'member',
///     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (project_id, user_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Role stored on a membership row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Can manage members and edit or delete any task
    Admin,

    /// Can view the project and work on own or assigned tasks
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }
}

impl Default for MemberRole {
    fn default() -> Self {
        MemberRole::Member
    }
}

/// Effective role of a user within a project
///
/// `Owner` is implied by `projects.owner_id`; the other two come from a
/// membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Owner,
    Admin,
    Member,
}

impl ProjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Owner => "owner",
            ProjectRole::Admin => "admin",
            ProjectRole::Member => "member",
        }
    }

    /// Owner or admin
    pub fn is_admin(&self) -> bool {
        matches!(self, ProjectRole::Owner | ProjectRole::Admin)
    }

    /// Can add, remove, and re-role members
    pub fn can_manage_members(&self) -> bool {
        self.is_admin()
    }

    /// Can delete the project
    pub fn can_delete_project(&self) -> bool {
        matches!(self, ProjectRole::Owner)
    }

    /// Checks if this role has at least the permission level of `required`
    ///
    /// Hierarchy: Owner > Admin > Member
    pub fn has_permission(&self, required: &ProjectRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            ProjectRole::Owner => 3,
            ProjectRole::Admin => 2,
            ProjectRole::Member => 1,
        }
    }
}

impl From<MemberRole> for ProjectRole {
    fn from(role: MemberRole) -> Self {
        match role {
            MemberRole::Admin => ProjectRole::Admin,
            MemberRole::Member => ProjectRole::Member,
        }
    }
}

impl std::fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectMember {
    pub id: i64,
    pub project_id: i64,
    pub user_id: i64,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// Input for adding a member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectMember {
    pub project_id: i64,
    pub user_id: i64,

    #[serde(default)]
    pub role: MemberRole,
}

/// Membership joined with the member's public profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberWithUser {
    pub user_id: i64,
    pub email: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

impl ProjectMember {
    /// Adds a user to a project
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `project_members_project_user_key`
    /// if the user is already a member.
    pub async fn create(pool: &PgPool, data: CreateProjectMember) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ProjectMember>(
            r#"
            INSERT INTO project_members (project_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING id, project_id, user_id, role, joined_at
            "#,
        )
        .bind(data.project_id)
        .bind(data.user_id)
        .bind(data.role)
        .fetch_one(pool)
        .await
    }

    /// Finds the membership row for a (project, user) pair
    pub async fn find(
        pool: &PgPool,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectMember>(
            r#"
            SELECT id, project_id, user_id, role, joined_at
            FROM project_members
            WHERE project_id = $1 AND user_id = $2
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Gets only the role for a (project, user) pair
    pub async fn find_role(
        pool: &PgPool,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<MemberRole>, sqlx::Error> {
        let row: Option<(MemberRole,)> = sqlx::query_as(
            "SELECT role FROM project_members WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(role,)| role))
    }

    /// Lists members of a project with their profiles, oldest first
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: i64,
    ) -> Result<Vec<MemberWithUser>, sqlx::Error> {
        sqlx::query_as::<_, MemberWithUser>(
            r#"
            SELECT pm.user_id, u.email, u.username, u.avatar_url, pm.role, pm.joined_at
            FROM project_members pm
            JOIN users u ON u.id = pm.user_id
            WHERE pm.project_id = $1
            ORDER BY pm.joined_at ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Changes a member's role; `None` if the user is not a member
    pub async fn update_role(
        pool: &PgPool,
        project_id: i64,
        user_id: i64,
        role: MemberRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectMember>(
            r#"
            UPDATE project_members
            SET role = $3
            WHERE project_id = $1 AND user_id = $2
            RETURNING id, project_id, user_id, role, joined_at
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    /// Removes a user from a project, returning whether a row was deleted
    pub async fn delete(pool: &PgPool, project_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM project_members WHERE project_id = $1 AND user_id = $2")
                .bind(project_id)
                .bind(user_id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Checks whether the user has a membership row in the project
    pub async fn exists(pool: &PgPool, project_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM project_members WHERE project_id = $1 AND user_id = $2)",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Counts membership rows (the owner is not included)
    pub async fn count_by_project(pool: &PgPool, project_id: i64) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM project_members WHERE project_id = $1")
                .bind(project_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}
