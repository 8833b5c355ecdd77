//! questauth - A minimal OpenID Connect login flow
//!
//! # Architecture
//!
//! ```text
//! browser ──/login──▶ auth::flow ──▶ auth::client (authorize URL)
//!    │                                      │
//!    ◀──────────── provider consent ◀───────┘
//!    │
//!    └──/auth?code&state──▶ auth::flow ──▶ auth::client (token, userinfo)
//!                               │
//!                               └──▶ auth::session (encrypted cookie) ──▶ web::pages
//! ```
//!
//! # Modules
//!
//! - `auth`: Login flow, provider client, sessions and tokens
//! - `web`: Index page, static assets, HTML views, metrics endpoint
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod web;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Everything in here is read-only after startup. Session contents
/// live in the client cookie, never in this struct.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Cookie session codec holding the process-wide key
    pub sessions: Arc<auth::SessionStore>,

    /// Identity provider client
    pub oauth: Arc<auth::OAuthClient>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Errors
    /// Returns error if the provider client cannot be built or the session
    /// secret cannot be generated.
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let sessions = auth::SessionStore::from_config(&config)?;
        let oauth = auth::OAuthClient::new(&config.oauth)?;

        tracing::info!(
            cookie = %sessions.cookie_name(),
            "Application state initialized successfully"
        );

        Ok(Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            oauth: Arc::new(oauth),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    Router::new()
        .merge(web::web_router(&state.config.assets.static_dir))
        .merge(auth::auth_router())
        .fallback(not_found)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(web::metrics_router())
}

async fn not_found() -> error::AppError {
    error::AppError::NotFound
}
