//! # TaskHub API Server
//!
//! Team task management backend: projects, members and tasks behind JWT
//! authentication with revocable tokens.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/taskhub \
//! JWT_SECRET=$(openssl rand -hex 32) \
//! cargo run -p taskhub-api
//! ```

use anyhow::Context;
use std::net::SocketAddr;
use taskhub_api::{
    app::{build_router, AppState},
    config::{Config, LogFormat},
};
use taskhub_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    redis::{client::sanitize_url, RedisClient},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "taskhub_api=debug,taskhub_shared=info,tower_http=debug";

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn connect_redis(config: &Config) -> Option<RedisClient> {
    let redis_config = config.redis.clone()?;
    let url = sanitize_url(&redis_config.url);

    match RedisClient::new(redis_config).await {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!(
                url = %url,
                error = %e,
                "Redis unavailable, using in-memory revocation and rate limiting"
            );
            None
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        production = config.api.production,
        "TaskHub API server starting"
    );

    let pool = create_pool(
        DatabaseConfig::from_url(config.database.url.clone())
            .with_max_connections(config.database.max_connections),
    )
    .await
    .context("Failed to connect to database")?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let redis = connect_redis(&config).await;
    let bind_address = config.bind_address();

    let state = AppState::new(pool.clone(), config, redis);
    tracing::info!(
        revocation_backend = state.revocations.backend_name(),
        rate_limit_backend = state.auth_limiter.backend_name(),
        "Security stores ready"
    );

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    tracing::info!(address = %bind_address, "Server listening");

    // Rate limiting keys on the socket peer
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
