/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use taskhub_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config, None);
/// let app = taskhub_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        rate_limit::{rate_limit_layer, RateLimit, RateLimiter},
        security::SecurityHeadersLayer,
    },
    routes,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self as axum_middleware, Next},
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use taskhub_shared::{
    auth::{access::AccessResolver, middleware::authenticate, revocation::RevocationStore},
    redis::RedisClient,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared application state
///
/// Cloned for each request via Axum's `State` extractor; every field is
/// cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Revoked token ids, consulted on every authenticated request
    pub revocations: RevocationStore,

    /// Project and task access decisions
    pub access: AccessResolver,

    /// Present when Redis is configured and reachable
    pub redis: Option<RedisClient>,

    /// Bucket limiter for register and login
    pub auth_limiter: RateLimiter,
}

impl AppState {
    /// Creates application state, using Redis-backed stores when a client is given
    pub fn new(db: PgPool, config: Config, redis: Option<RedisClient>) -> Self {
        let revocations = match &redis {
            Some(client) => RevocationStore::with_redis(client),
            None => RevocationStore::in_memory(),
        };

        let auth_limiter = RateLimiter::new(
            "auth",
            RateLimit::per_minute(config.rate_limit.auth_per_minute),
            redis.as_ref(),
        )
        .with_trusted_proxies(config.rate_limit.trusted_proxies.clone());

        Self {
            access: AccessResolver::postgres(db.clone()),
            db,
            config: Arc::new(config),
            revocations,
            redis,
            auth_limiter,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET /health, /health/live, /health/ready
/// ├── /auth
/// │   ├── POST /register, /login          (rate limited)
/// │   ├── POST /refresh
/// │   ├── POST /logout, /change-password  (authenticated)
/// │   └── GET|PATCH /me                   (authenticated)
/// ├── /projects                           (authenticated)
/// │   ├── GET|POST /
/// │   ├── GET|PATCH|DELETE /:id
/// │   ├── GET /:id/stats
/// │   ├── GET|POST /:id/members
/// │   ├── PATCH|DELETE /:id/members/:user_id
/// │   ├── GET|POST /:id/tasks
/// │   └── GET|POST /:id/tags
/// ├── /tasks                              (authenticated)
/// │   ├── GET /my, /all
/// │   ├── GET|PATCH|DELETE /:id
/// │   ├── GET|POST /:id/comments
/// │   ├── GET|POST /:id/tags
/// │   └── DELETE /:id/tags/:tag_id
/// ├── /comments/:id                       (authenticated, PATCH|DELETE)
/// ├── /tags/:id                           (authenticated, PATCH|DELETE)
/// └── /admin/revocations/:jti             (system admin)
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, request id, tracing, then
/// authentication and rate limiting per route group.
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .route("/health/ready", get(routes::health::readiness));

    let limited_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .layer(axum_middleware::from_fn_with_state(
            state.auth_limiter.clone(),
            rate_limit_layer,
        ));

    let session_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me).patch(routes::auth::update_me))
        .route("/change-password", post(routes::auth::change_password))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let auth_routes = Router::new()
        .merge(limited_auth_routes)
        .route("/refresh", post(routes::auth::refresh))
        .merge(session_routes);

    let project_routes = Router::new()
        .route(
            "/",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/:id",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route("/:id/stats", get(routes::projects::project_stats))
        .route(
            "/:id/members",
            get(routes::members::list_members).post(routes::members::add_member),
        )
        .route(
            "/:id/members/:user_id",
            patch(routes::members::update_member)
                .delete(routes::members::remove_member),
        )
        .route(
            "/:id/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/:id/tags",
            get(routes::tags::list_tags).post(routes::tags::create_tag),
        );

    let task_routes = Router::new()
        .route("/my", get(routes::tasks::list_my_tasks))
        .route("/all", get(routes::tasks::list_all_tasks))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/:id/comments",
            get(routes::comments::list_comments).post(routes::comments::create_comment),
        )
        .route(
            "/:id/tags",
            get(routes::tags::list_task_tags).post(routes::tags::attach_tags),
        )
        .route("/:id/tags/:tag_id", delete(routes::tags::detach_tag));

    let comment_routes = Router::new().route(
        "/:id",
        patch(routes::comments::update_comment).delete(routes::comments::delete_comment),
    );

    let tag_routes = Router::new().route(
        "/:id",
        patch(routes::tags::update_tag).delete(routes::tags::delete_tag),
    );

    let admin_routes = Router::new().route(
        "/revocations/:jti",
        delete(routes::admin::remove_revocation),
    );

    let protected_routes = Router::new()
        .nest("/projects", project_routes)
        .nest("/tasks", task_routes)
        .nest("/comments", comment_routes)
        .nest("/tags", tag_routes)
        .nest("/admin", admin_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let observability = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(PropagateRequestIdLayer::new(request_id));

    Router::new()
        .merge(health_routes)
        .nest("/auth", auth_routes)
        .merge(protected_routes)
        .layer(observability)
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Bearer token authentication layer
///
/// Rejects missing, invalid, expired and revoked access tokens, then places
/// the [`AuthContext`](taskhub_shared::auth::middleware::AuthContext) in
/// request extensions.
pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate(req.headers(), state.jwt_secret(), &state.revocations).await?;

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
