/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use managify_api::app::{build_router, AppState};
/// use managify_api::config::Config;
/// use managify_api::middleware::{metrics::InMemoryMetrics, rate_limit::{RateLimit, RateLimiter}};
/// use managify_shared::db::Database;
/// use managify_shared::notify::{LogEmailSender, NotificationPool, NotifierConfig};
/// use managify_shared::services::{account::TokenSettings, Services};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = NotificationPool::start(Arc::new(LogEmailSender), NotifierConfig::default());
/// let services = Services::new(
///     Database::memory(),
///     TokenSettings {
///         secret: Arc::from(config.jwt.secret.as_str()),
///         ttl: chrono::Duration::seconds(config.jwt.ttl_seconds),
///     },
///     pool.notifier(),
/// );
/// let limiter = RateLimiter::local(RateLimit::per_window(100, 60));
/// let state = AppState::new(services, config, Arc::new(InMemoryMetrics::new()), limiter);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        metrics::{metrics_layer, MetricsSink},
        rate_limit::{rate_limit_layer, RateLimiter},
        security::SecurityHeadersLayer,
    },
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, post, put},
    Extension, Router,
};
use managify_shared::auth::{
    authorization::require_admin,
    middleware::{authenticate, AuthContext},
};
use managify_shared::services::Services;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Domain services over the configured store
    pub services: Services,

    /// Application configuration
    pub config: Arc<Config>,

    /// Per-route request timings
    pub metrics: Arc<dyn MetricsSink>,

    /// Per-client request limits
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Creates new application state
    pub fn new(
        services: Services,
        config: Config,
        metrics: Arc<dyn MetricsSink>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            services,
            config: Arc::new(config),
            metrics,
            rate_limiter,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// ├── /metrics                         # Route timings (METRICS=true)
/// └── /v1/                             # Rate limited
///     ├── /auth/                       # Public
///     │   ├── POST /register
///     │   ├── POST /login
///     │   └── GET  /verify-email
///     ├── /users, /projects, /invites,  # JWT required
///     │   /statuses, /issues, /roles, /logs
///     └── /admin/                      # JWT + admin claim
/// ```
///
/// # Middleware Stack
///
/// Applied outermost first:
/// 1. Security headers
/// 2. CORS
/// 3. Compression
/// 4. Logging (tower-http TraceLayer)
/// 5. Metrics
/// 6. Rate limiting (`/v1` only)
/// 7. Authentication and admin guard (per route group)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/verify-email", get(routes::auth::verify_email));

    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route(
            "/users/:user_id",
            get(routes::admin::get_user).delete(routes::admin::delete_user),
        )
        .route("/projects", get(routes::admin::list_projects))
        .route("/roles", get(routes::admin::list_roles))
        .route_layer(axum::middleware::from_fn(admin_guard));

    let protected_routes = Router::new()
        .route("/users/:user_id", get(routes::users::get_user))
        .route("/projects", post(routes::projects::create_project))
        .route(
            "/projects/:project_id",
            get(routes::projects::get_project).delete(routes::projects::delete_project),
        )
        .route("/projects/member/:member_id", delete(routes::projects::remove_member))
        .route(
            "/invites",
            post(routes::invites::create_invite).get(routes::invites::list_invites),
        )
        .route("/invites/:invite_id/respond", put(routes::invites::respond_invite))
        .route("/statuses", post(routes::statuses::create_status))
        .route(
            "/statuses/:project_id/:status_id",
            delete(routes::statuses::delete_status),
        )
        .route("/issues", post(routes::issues::create_issue))
        .route("/issues/upcoming", get(routes::issues::upcoming_issues))
        .route("/issues/status/:status_id", get(routes::issues::issues_by_status))
        .route("/issues/:issue_id", delete(routes::issues::delete_issue))
        .route(
            "/issues/:issue_id/status/:status_id",
            put(routes::issues::update_issue_status),
        )
        .route("/roles", post(routes::roles::add_role))
        .route("/roles/:role_id", delete(routes::roles::delete_role))
        .route("/logs", get(routes::logs::recent_logs))
        .route("/logs/project/:project_id", get(routes::logs::project_logs))
        .nest("/admin", admin_routes)
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes)
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_layer,
        ));

    let mut public_routes = Router::new().route("/health", get(routes::health::health_check));
    if state.config.api.metrics_enabled {
        public_routes = public_routes.route("/metrics", get(routes::metrics::metrics_report));
    }

    // Configure CORS based on environment
    let cors = if state.config.cors_allows_any() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(public_routes)
        .nest("/v1", v1_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics_layer,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Validates the bearer token and injects [`AuthContext`] into request
/// extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_context = authenticate(req.headers(), state.jwt_secret())?;

    tracing::debug!(user_id = %auth_context.user_id, "Request authenticated");
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// Rejects callers without the admin claim
async fn admin_guard(
    Extension(auth): Extension<AuthContext>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_admin(&auth)?;
    Ok(next.run(req).await)
}
