//! Common test utilities for integration tests
//!
//! - `offline_state`: application state over a lazy pool that never connects,
//!   for exercising middleware that answers before any query runs
//! - `TestContext`: migrated database with a seeded project and users, for
//!   end-to-end tests (requires PostgreSQL at `DATABASE_URL`)
//! - `send`: drives a router with one request and decodes the JSON body

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::PgPool;
use taskhub_api::app::{build_router, AppState};
use taskhub_api::config::Config;
use taskhub_shared::auth::jwt::{create_token, Claims, TokenType};
use taskhub_shared::auth::password::hash_password;
use taskhub_shared::db::migrations::run_migrations;
use taskhub_shared::models::project::{CreateProject, Project};
use taskhub_shared::models::project_member::{CreateProjectMember, MemberRole, ProjectMember};
use taskhub_shared::models::user::{CreateUser, User, UserRole};
use tower::Service as _;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const TEST_PASSWORD: &str = "correct horse battery staple";

const DEFAULT_DATABASE_URL: &str = "postgresql://localhost:5432/taskhub_test";

/// Test configuration: environment first, then test defaults, with `overrides` winning
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    Config::from_lookup(|key| {
        if let Some((_, value)) = overrides.iter().find(|(k, _)| *k == key) {
            return Some(value.to_string());
        }

        std::env::var(key).ok().or_else(|| match key {
            "DATABASE_URL" => Some(DEFAULT_DATABASE_URL.to_string()),
            "JWT_SECRET" => Some(TEST_SECRET.to_string()),
            "RATE_LIMIT_AUTH_PER_MINUTE" => Some("1000".to_string()),
            _ => None,
        })
    })
    .expect("test configuration")
}

/// State whose pool connects on first use only
pub fn offline_state(overrides: &[(&str, &str)]) -> AppState {
    let mut overrides = overrides.to_vec();
    overrides.push(("JWT_SECRET", TEST_SECRET));

    let config = test_config(&overrides);
    let db = PgPool::connect_lazy(&config.database.url).expect("lazy pool");

    AppState::new(db, config, None)
}

pub fn token(user_id: i64, token_type: TokenType) -> (Claims, String) {
    let claims = Claims::new(user_id, token_type);
    let token = create_token(&claims, TEST_SECRET).expect("token");
    (claims, token)
}

/// Sends one request and returns the status, headers and JSON body (`Null` if empty)
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, axum::http::HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().call(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, headers, json)
}

/// A seeded user with a ready access token
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

/// Database-backed test context
///
/// Seeds one project owned by `owner` with `admin` (project admin) and
/// `member` (project member); `outsider` has no role in it and
/// `sysadmin` is a system administrator outside the project.
pub struct TestContext {
    pub db: PgPool,
    pub state: AppState,
    pub app: Router,
    pub project: Project,
    pub owner: TestUser,
    pub admin: TestUser,
    pub member: TestUser,
    pub outsider: TestUser,
    pub sysadmin: TestUser,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let config = test_config(&[("JWT_SECRET", TEST_SECRET)]);

        let db = PgPool::connect(&config.database.url).await?;
        run_migrations(&db).await?;

        let owner = Self::create_user(&db, "owner", UserRole::Member).await?;
        let admin = Self::create_user(&db, "admin", UserRole::Member).await?;
        let member = Self::create_user(&db, "member", UserRole::Member).await?;
        let outsider = Self::create_user(&db, "outsider", UserRole::Member).await?;
        let sysadmin = Self::create_user(&db, "sysadmin", UserRole::Admin).await?;

        let project = Project::create(
            &db,
            CreateProject {
                name: format!("Test Project {}", Uuid::new_v4()),
                description: None,
                owner_id: owner.id(),
            },
        )
        .await?;

        for (user, role) in [(&admin, MemberRole::Admin), (&member, MemberRole::Member)] {
            ProjectMember::create(
                &db,
                CreateProjectMember {
                    project_id: project.id,
                    user_id: user.id(),
                    role,
                },
            )
            .await?;
        }

        let state = AppState::new(db.clone(), config, None);
        let app = build_router(state.clone());

        Ok(Self {
            db,
            state,
            app,
            project,
            owner,
            admin,
            member,
            outsider,
            sysadmin,
        })
    }

    async fn create_user(db: &PgPool, label: &str, role: UserRole) -> anyhow::Result<TestUser> {
        let user = User::create(
            db,
            CreateUser {
                email: format!("{}-{}@example.com", label, Uuid::new_v4()),
                username: label.to_string(),
                password_hash: hash_password(TEST_PASSWORD)?,
                role,
            },
        )
        .await?;

        let (_, token) = token(user.id, TokenType::Access);

        Ok(TestUser { user, token })
    }

    /// Creates a task in the seeded project and returns its id
    pub async fn create_task(&self, as_user: &TestUser, body: Value) -> i64 {
        let uri = format!("/projects/{}/tasks", self.project.id);
        let (status, json) = self.send("POST", &uri, as_user, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "task creation failed: {}", json);
        json["id"].as_i64().expect("task id")
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        as_user: &TestUser,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, _, json) = send(&self.app, method, uri, Some(&as_user.token), body).await;
        (status, json)
    }

    /// Removes everything this context created
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        Project::delete(&self.db, self.project.id).await?;

        let users = [
            &self.owner,
            &self.admin,
            &self.member,
            &self.outsider,
            &self.sysadmin,
        ];
        let ids: Vec<i64> = users.iter().map(|u| u.id()).collect();
        let emails: Vec<&str> = users.iter().map(|u| u.user.email.as_str()).collect();

        sqlx::query("DELETE FROM login_attempts WHERE email = ANY($1)")
            .bind(&emails)
            .execute(&self.db)
            .await?;
        sqlx::query("DELETE FROM projects WHERE owner_id = ANY($1)")
            .bind(&ids)
            .execute(&self.db)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}
