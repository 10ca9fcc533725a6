//! CodeIQ - GitHub sign-in and session backend for the CodeIQ dashboard
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - /auth/* endpoints (cookies in, cookies out)              │
//! │  - Repository routes behind the auth gate                   │
//! │  - Health and metrics                                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Sign-in, refresh, verify, logout flows                   │
//! │  - Upstream GitHub token refresh                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx): users, active_sessions                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers outside the auth endpoints
//! - `auth`: tokens, cookies, GitHub client, auth gate, auth endpoints
//! - `service`: Auth flows
//! - `data`: User and session stores
//! - `clock`: Injectable time source
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the database pool and the GitHub client.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Sign-in, refresh and logout flows
    pub auth: Arc<service::AuthService>,

    /// Gate for routes that call GitHub on the user's behalf
    pub gate: Arc<auth::AuthGate>,

    /// Attributes for the `jwt` and `refresh` cookies
    pub cookies: auth::CookiePolicy,

    /// Limiter for `/auth/callback` and `/auth/refresh`
    pub auth_limiter: Arc<auth::RateLimiter>,

    /// Time source for every expiry check
    pub clock: Arc<dyn clock::Clock>,
}

impl AppState {
    /// Initialize application state on the wall clock
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        Self::with_clock(config, Arc::new(clock::SystemClock)).await
    }

    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite and run migrations
    /// 2. Build the token issuer and GitHub client
    /// 3. Wire the auth service, gate and rate limiter
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn with_clock(
        config: config::AppConfig,
        clock: Arc<dyn clock::Clock>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = Arc::new(data::Database::connect(&config.db_url).await?);
        tracing::info!("Database connected");

        // 2. Token issuer and GitHub client
        let tokens = Arc::new(auth::TokenIssuer::new(
            &config.jwt_signing_key,
            &config.jwt_issuer,
            &config.jwt_audience,
        ));
        let github = Arc::new(auth::GitHubClient::new(&config)?);

        // 3. Flows
        let auth_service = Arc::new(service::AuthService::new(
            db.clone(),
            tokens,
            github,
            clock.clone(),
            config.strict_sessions,
        ));
        let gate = Arc::new(auth::AuthGate::new(auth_service.clone()));
        let auth_limiter = Arc::new(auth::RateLimiter::new(
            config.auth_rate_limit_max,
            config.auth_rate_limit_window_seconds,
            clock.clone(),
        ));
        let cookies = auth::CookiePolicy::for_environment(config.is_production());

        tracing::info!(
            production = config.is_production(),
            strict_sessions = config.strict_sessions,
            "Application state initialized successfully"
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            auth: auth_service,
            gate,
            cookies,
            auth_limiter,
            clock,
        })
    }

    /// Delete sessions whose expiry has passed
    ///
    /// Returns the number of rows removed.
    pub async fn sweep_expired_sessions(&self) -> Result<u64, error::AppError> {
        let removed = self.db.delete_expired_sessions(self.clock.now()).await?;
        metrics::SESSIONS_SWEPT_TOTAL.inc_by(removed);
        let forgotten = self.auth_limiter.prune_expired().await;
        if forgotten > 0 {
            tracing::debug!(forgotten, "Pruned closed rate limit windows");
        }
        Ok(removed)
    }
}

/// Build the Axum router with all public routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments. `/metrics` is not part of
/// it; see [`build_metrics_router`].
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.frontend_url);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router(state.clone()))
        .merge(api::repos_router())
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Router for the metrics listener bound to `METRICS_HOST:METRICS_PORT`
pub fn build_metrics_router() -> axum::Router {
    api::metrics_router()
}

/// CORS for the dashboard origin only, with credentials
fn build_cors_layer(frontend_url: &str) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let origin = frontend_url.trim_end_matches('/');
    match HeaderValue::from_str(origin) {
        Ok(origin) => base.allow_origin([origin]),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %frontend_url,
                "Failed to parse CORS origin from FRONTEND_URL; denying cross-origin requests"
            );
            base
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> error::AppError {
    error::AppError::NotFound
}
