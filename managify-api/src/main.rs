//! # Managify API Server
//!
//! Project-management API: accounts, projects with plan quotas, invites,
//! statuses, issues, roles and activity logs.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p managify-api
//! ```
//!
//! Without `DATABASE_URL` the server keeps all data in memory.

use managify_api::{
    app::{build_router, AppState},
    config::Config,
    middleware::{
        metrics::InMemoryMetrics,
        rate_limit::{RateLimit, RateLimiter},
    },
};
use managify_shared::{
    db::{pool::PoolConfig, Database},
    notify::{EmailSender, LogEmailSender, NotificationPool, NotifierConfig, RelayEmailSender},
    services::{account::TokenSettings, Services},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "Managify API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let db = open_store(&config).await?;

    let sender: Arc<dyn EmailSender> = match &config.notify.relay_url {
        Some(url) => {
            tracing::info!(relay = %url, "Sending e-mail through HTTP relay");
            Arc::new(RelayEmailSender::new(url.clone()))
        }
        None => {
            tracing::info!("No EMAIL_RELAY_URL set, e-mails are logged only");
            Arc::new(LogEmailSender)
        }
    };
    let notifications = NotificationPool::start(
        sender,
        NotifierConfig {
            workers: config.notify.workers,
            queue_size: config.notify.queue_size,
            base_url: config.notify.base_url.clone(),
        },
    );

    let services = Services::new(
        db,
        TokenSettings {
            secret: Arc::from(config.jwt.secret.as_str()),
            ttl: chrono::Duration::seconds(config.jwt.ttl_seconds),
        },
        notifications.notifier(),
    );

    let limit = RateLimit::per_window(config.rate_limit.max_requests, config.rate_limit.window_seconds);
    let rate_limiter = match &config.rate_limit.redis_url {
        Some(url) => {
            tracing::info!("Rate limiting through Redis");
            RateLimiter::redis(url, limit).await?
        }
        None => RateLimiter::local(limit),
    };

    let bind_address = config.bind_address();
    let state = AppState::new(services, config, Arc::new(InMemoryMetrics::new()), rate_limiter);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("HTTP server stopped, draining notifications");
    notifications.shutdown().await;

    Ok(())
}

/// Installs the global subscriber; `LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "managify_api=debug,managify_shared=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn open_store(config: &Config) -> anyhow::Result<Database> {
    let timeout = Duration::from_millis(config.database.operation_timeout_ms);

    match &config.database.url {
        Some(url) => {
            let db = managify_shared::db::pool::connect_postgres_store(
                PoolConfig {
                    url: url.clone(),
                    max_connections: config.database.max_connections,
                    ..PoolConfig::default()
                },
                timeout,
            )
            .await?;
            tracing::info!("Using PostgreSQL document store");
            Ok(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on exit");
            Ok(Database::with_timeout(
                Arc::new(managify_shared::db::memory::MemoryStore::new()),
                timeout,
            ))
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
