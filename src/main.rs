//! questauth binary entry point

use questauth::{AppState, config, config::LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from the `logging` section
/// 3. Initialize AppState (session key, provider client)
/// 4. Build Axum router
/// 5. Start HTTP server
///
/// Any failure before step 5 exits without accepting connections.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let loaded = config::AppConfig::load();

    // A config error is still logged, with the default logging settings
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging);

    let config = loaded.inspect_err(|error| tracing::error!(%error, "Invalid configuration"))?;

    tracing::info!("Starting questauth...");
    if !config.should_use_secure_cookies() {
        tracing::warn!(
            redirect_url = %config.oauth.redirect_url,
            "Using insecure session cookies for local development"
        );
    }

    questauth::metrics::init_metrics();

    tracing::info!(
        redirect_url = %config.oauth.redirect_url,
        auth_url = %config.oauth.auth_url,
        "Configuration loaded"
    );

    let state = AppState::new(config.clone())?;
    let app = questauth::build_router(state);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// `RUST_LOG` takes precedence over `logging.level`
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.default_filter().into());

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
