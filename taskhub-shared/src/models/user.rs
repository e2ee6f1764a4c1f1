/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     email VARCHAR(120) NOT NULL UNIQUE,
///     username VARCHAR(80) NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     role user_role NOT NULL DEFAULT 'member',
///     avatar_url VARCHAR(512),
///     bio TEXT,
///     department VARCHAR(100),
///     position VARCHAR(100),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     last_login_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Emails are normalised to lowercase before they are stored or looked up.
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::models::user::{CreateUser, User, UserRole};
/// use taskhub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "Ada@Example.com".to_string(),
///     username: "ada".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role: UserRole::Member,
/// }).await?;
///
/// let found = User::find_by_email(&pool, "ada@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

/// System-wide role, independent of any project role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Member,
}

/// User account
///
/// The password hash is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    /// Lowercase email, unique across users
    pub email: String,

    pub username: String,

    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub role: UserRole,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,

    /// Inactive users cannot log in
    pub is_active: bool,

    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub username: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub role: UserRole,
}

/// Self-service profile changes
///
/// `None` leaves a field unchanged; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub username: Option<String>,
    pub avatar_url: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub department: Option<Option<String>>,
    pub position: Option<Option<String>>,
}

impl UpdateProfile {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.avatar_url.is_none()
            && self.bio.is_none()
            && self.department.is_none()
            && self.position.is_none()
    }
}

const RETURNING: &str = " RETURNING id, email, username, password_hash, role, avatar_url, bio, \
     department, position, is_active, last_login_at, created_at, updated_at";

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_email_key` if the email is taken.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, username, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, username, password_hash, role, avatar_url, bio,
                      department, position, is_active, last_login_at, created_at, updated_at
            "#,
        )
        .bind(data.email.trim().to_lowercase())
        .bind(data.username)
        .bind(data.password_hash)
        .bind(data.role)
        .fetch_one(pool)
        .await
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, role, avatar_url, bio,
                   department, position, is_active, last_login_at, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, role, avatar_url, bio,
                   department, position, is_active, last_login_at, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await
    }

    /// Counts all users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Stamps the last login time
    pub async fn update_last_login(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies profile changes, returning the updated user
    pub async fn update_profile(
        pool: &PgPool,
        id: i64,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE users SET updated_at = NOW()");

        if let Some(username) = data.username {
            query.push(", username = ").push_bind(username);
        }
        if let Some(avatar_url) = data.avatar_url {
            query.push(", avatar_url = ").push_bind(avatar_url);
        }
        if let Some(bio) = data.bio {
            query.push(", bio = ").push_bind(bio);
        }
        if let Some(department) = data.department {
            query.push(", department = ").push_bind(department);
        }
        if let Some(position) = data.position {
            query.push(", position = ").push_bind(position);
        }

        query.push(" WHERE id = ").push_bind(id);
        query.push(RETURNING);

        query.build_query_as::<User>().fetch_optional(pool).await
    }

    /// Replaces the stored password hash
    pub async fn update_password_hash(
        pool: &PgPool,
        id: i64,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        let now = Utc::now();
        User {
            id: 1,
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: UserRole::Member,
            avatar_url: None,
            bio: None,
            department: None,
            position: None,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "ada@example.com");
        assert_eq!(json["role"], "member");
    }

    #[test]
    fn test_is_admin() {
        let mut user = sample();
        assert!(!user.is_admin());
        user.role = UserRole::Admin;
        assert!(user.is_admin());
    }

    #[test]
    fn test_update_profile_is_empty() {
        assert!(UpdateProfile::default().is_empty());
        assert!(!UpdateProfile {
            bio: Some(None),
            ..Default::default()
        }
        .is_empty());
    }
}
