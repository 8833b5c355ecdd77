//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. `.env` file and environment variables (override)

use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::AppError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    pub session: SessionConfig,
    pub assets: AssetsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub host: String,
    /// Port number (e.g., 9090)
    pub port: u16,
}

impl ServerConfig {
    /// Address the listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// OpenID Connect provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback URL registered with the provider (e.g. "http://localhost:9090/auth")
    pub redirect_url: String,
    /// Requested scopes, joined with spaces in the authorize URL
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// Timeout for token exchange and userinfo calls
    pub timeout_seconds: u64,
}

/// Session cookie configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Cookie name
    pub cookie_name: String,
    /// Cookie max age in seconds (default: 604800 = 7 days)
    pub max_age_seconds: i64,
    /// Optional fixed secret (32+ bytes). Generated at startup when absent.
    pub secret: Option<String>,
    /// Force the `Secure` cookie attribute. Defaults to https redirect URLs.
    pub secure: Option<bool>,
}

/// Static asset configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Directory holding `css/` and `img/`
    pub static_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_filter(&self) -> String {
        format!("questauth={},tower_http=debug", self.level.trim())
    }

    pub fn is_json(&self) -> bool {
        self.format.trim().eq_ignore_ascii_case("json")
    }
}

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

pub const DEFAULT_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/userinfo.email",
    "openid",
];

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (QUESTAUTH__*), including those from `.env`
    ///
    /// # Errors
    /// Returns `AppError::Config` if a required value is missing or invalid
    pub fn load() -> Result<Self, AppError> {
        // A missing .env is fine; real deployments set the environment directly.
        dotenvy::dotenv().ok();

        Self::load_from(Path::new("config"))
    }

    /// Load configuration with `default.toml` / `local.toml` taken from `config_dir`
    pub fn load_from(config_dir: &Path) -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("oauth.scopes", DEFAULT_SCOPES.to_vec())?
            .set_default("oauth.auth_url", GOOGLE_AUTH_URL)?
            .set_default("oauth.token_url", GOOGLE_TOKEN_URL)?
            .set_default("oauth.userinfo_url", GOOGLE_USERINFO_URL)?
            .set_default("oauth.timeout_seconds", 10)?
            .set_default("session.cookie_name", "questsession")?
            .set_default("session.max_age_seconds", 604800)?
            .set_default("assets.static_dir", "./static")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("QUESTAUTH")
                    .separator("__")
                    .list_separator(" ")
                    .with_list_parse_key("oauth.scopes")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Whether the session cookie carries the `Secure` attribute
    pub fn should_use_secure_cookies(&self) -> bool {
        self.session.secure.unwrap_or_else(|| {
            self.oauth
                .redirect_url
                .trim()
                .to_ascii_lowercase()
                .starts_with("https://")
        })
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        for (name, value) in [
            ("oauth.client_id", &self.oauth.client_id),
            ("oauth.client_secret", &self.oauth.client_secret),
            ("server.host", &self.server.host),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{name} must not be empty")));
            }
        }

        for (name, value) in [
            ("oauth.redirect_url", &self.oauth.redirect_url),
            ("oauth.auth_url", &self.oauth.auth_url),
            ("oauth.token_url", &self.oauth.token_url),
            ("oauth.userinfo_url", &self.oauth.userinfo_url),
        ] {
            parse_http_url(name, value)?;
        }

        if self.oauth.scopes.iter().all(|scope| scope.trim().is_empty()) {
            return Err(AppError::Config(
                "oauth.scopes must contain at least one scope".to_string(),
            ));
        }

        if self.oauth.timeout_seconds == 0 {
            return Err(AppError::Config(
                "oauth.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.session.max_age_seconds <= 0 {
            return Err(AppError::Config(
                "session.max_age_seconds must be greater than 0".to_string(),
            ));
        }

        if let Some(secret) = &self.session.secret {
            if secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
                return Err(AppError::Config(format!(
                    "session.secret must be at least {} bytes",
                    MIN_SESSION_SECRET_BYTES
                )));
            }
        }

        if !["pretty", "json"]
            .iter()
            .any(|format| self.logging.format.trim().eq_ignore_ascii_case(format))
        {
            return Err(AppError::Config(format!(
                "logging.format must be pretty or json, got {}",
                self.logging.format
            )));
        }

        Ok(())
    }
}

fn parse_http_url(name: &str, value: &str) -> Result<Url, AppError> {
    let url = Url::parse(value.trim())
        .map_err(|e| AppError::Config(format!("{name} is not a valid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(AppError::Config(format!(
            "{name} must use http or https, got {scheme}"
        ))),
    }
}
