//! Pages and assets outside the login flow
//!
//! Routes:
//! - GET / - Index page
//! - GET /css/*, /img/* - Static assets
//! - GET /metrics - Prometheus metrics

pub mod pages;

use std::path::Path;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use prometheus::{Encoder, TextEncoder};
use tower_http::services::ServeDir;

use crate::AppState;
use crate::auth::session::USER_ID_KEY;
use crate::metrics::REGISTRY;

/// Create the router for the index page and static assets
pub fn web_router(static_dir: &Path) -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .nest_service("/css", ServeDir::new(static_dir.join("css")))
        .nest_service("/img", ServeDir::new(static_dir.join("img")))
}

/// GET /
///
/// Reads the session but never writes it.
async fn index(State(state): State<AppState>, jar: CookieJar) -> Html<String> {
    let session = state.sessions.load(&jar);
    Html(pages::index_page(session.get(USER_ID_KEY)))
}

/// Metrics endpoint handler
///
/// Returns all metrics in Prometheus text format.
async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            metrics_text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Create metrics router
///
/// Exposes the `/metrics` endpoint.
pub fn metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/metrics", get(metrics_handler))
}
