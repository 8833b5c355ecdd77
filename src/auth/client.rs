//! OpenID Connect provider client
//!
//! Wraps the three provider endpoints used by the login flow:
//! authorize URL construction, code exchange and userinfo.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::config::OAuthConfig;
use crate::error::AppError;
use crate::metrics::UPSTREAM_REQUEST_DURATION_SECONDS;

const TIMEOUT_MESSAGE: &str = "identity provider did not respond in time, please sign in again";

/// Access token obtained from the token endpoint
#[derive(Clone)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Error members a provider may put in any response body
///
/// Providers report errors in the body, sometimes with a 2xx status.
/// `error` is usually a code string but some userinfo endpoints nest an object.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<serde_json::Value>,
    error_description: Option<String>,
}

impl ErrorBody {
    fn message(&self) -> Option<String> {
        let error = match self.error.as_ref()? {
            serde_json::Value::Null => return None,
            serde_json::Value::String(code) => code.clone(),
            other => other.to_string(),
        };
        Some(match &self.error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        })
    }
}

/// Token endpoint response body
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
    #[serde(flatten)]
    failure: ErrorBody,
}

impl TokenResponse {
    fn error_message(&self) -> Option<String> {
        self.failure.message()
    }
}

/// Client for a single OpenID Connect provider
#[derive(Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_url: Url,
    scopes: Vec<String>,
    auth_url: Url,
    token_url: Url,
    userinfo_url: Url,
    http: reqwest::Client,
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("redirect_url", &self.redirect_url.as_str())
            .field("auth_url", &self.auth_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("userinfo_url", &self.userinfo_url.as_str())
            .finish_non_exhaustive()
    }
}

impl OAuthClient {
    /// Create a client from validated configuration
    ///
    /// # Errors
    /// Returns `AppError::Config` if an endpoint URL does not parse or the
    /// HTTP client cannot be built.
    pub fn new(config: &OAuthConfig) -> Result<Self, AppError> {
        let parse = |name: &str, value: &str| {
            Url::parse(value.trim())
                .map_err(|e| AppError::Config(format!("{name} is not a valid URL: {e}")))
        };

        let http = reqwest::Client::builder()
            .user_agent(concat!("questauth/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url: parse("oauth.redirect_url", &config.redirect_url)?,
            scopes: config
                .scopes
                .iter()
                .map(|scope| scope.trim().to_string())
                .filter(|scope| !scope.is_empty())
                .collect(),
            auth_url: parse("oauth.auth_url", &config.auth_url)?,
            token_url: parse("oauth.token_url", &config.token_url)?,
            userinfo_url: parse("oauth.userinfo_url", &config.userinfo_url)?,
            http,
        })
    }

    /// Build the provider's consent URL for a login attempt
    pub fn authorize_url(&self, state: &str) -> Url {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", self.redirect_url.as_str())
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state);
        url
    }

    /// Exchange an authorization code for an access token
    ///
    /// # Errors
    /// Returns `AppError::Exchange` on transport failure, timeout, non-2xx
    /// status, an error body, or a payload without a bearer access token.
    pub async fn exchange_code(&self, code: &str) -> Result<AccessToken, AppError> {
        if code.is_empty() {
            return Err(AppError::Exchange(
                "missing authorization code".to_string(),
            ));
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_url.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let timer = UPSTREAM_REQUEST_DURATION_SECONDS
            .with_label_values(&["token"])
            .start_timer();
        let result = self
            .http
            .post(self.token_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await;
        let response = result.map_err(|e| AppError::Exchange(describe_transport_error(&e)))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Exchange(describe_transport_error(&e)));
        timer.observe_duration();
        let body = body?;

        let parsed: Option<TokenResponse> = serde_json::from_slice(&body).ok();

        if !status.is_success() {
            let detail = parsed
                .as_ref()
                .and_then(TokenResponse::error_message)
                .unwrap_or_else(|| format!("token endpoint returned {status}"));
            return Err(AppError::Exchange(detail));
        }

        let token = parsed.ok_or_else(|| {
            AppError::Exchange("token endpoint returned a malformed payload".to_string())
        })?;

        if let Some(message) = token.error_message() {
            return Err(AppError::Exchange(message));
        }

        let access_token = token
            .access_token
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Exchange("token response has no access_token".to_string()))?;

        let token_type = token.token_type.unwrap_or_else(|| "Bearer".to_string());
        if !token_type.eq_ignore_ascii_case("bearer") {
            return Err(AppError::Exchange(format!(
                "unsupported token type {token_type}"
            )));
        }

        Ok(AccessToken {
            access_token,
            token_type,
            expires_in: token.expires_in,
            scope: token.scope,
        })
    }

    /// Fetch the raw userinfo document for a token
    ///
    /// # Errors
    /// Returns `AppError::UserInfo` on transport failure, timeout, non-2xx
    /// status, or an `error` member in a 2xx body.
    pub async fn fetch_user_info(&self, token: &AccessToken) -> Result<Vec<u8>, AppError> {
        let timer = UPSTREAM_REQUEST_DURATION_SECONDS
            .with_label_values(&["userinfo"])
            .start_timer();
        let result = self
            .http
            .get(self.userinfo_url.clone())
            .bearer_auth(&token.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await;
        let response = result.map_err(|e| AppError::UserInfo(describe_transport_error(&e)))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::UserInfo(describe_transport_error(&e)));
        timer.observe_duration();
        let body = body?;

        if !status.is_success() {
            return Err(AppError::UserInfo(format!(
                "userinfo endpoint returned {status}"
            )));
        }

        if let Some(message) = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|failure| failure.message())
        {
            return Err(AppError::UserInfo(message));
        }

        Ok(body.to_vec())
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        TIMEOUT_MESSAGE.to_string()
    } else {
        error.to_string()
    }
}
