#![allow(dead_code)]

//! Common test utilities for E2E tests

use std::path::PathBuf;

use questauth::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "test-client-id";
pub const CLIENT_SECRET: &str = "test-client-secret";
pub const COOKIE_NAME: &str = "questsession";

/// Test server instance backed by a mock identity provider
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider: MockServer,
    pub _static_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let provider = MockServer::start().await;

        let static_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(static_dir.path().join("css")).unwrap();
        std::fs::create_dir_all(static_dir.path().join("img")).unwrap();
        std::fs::write(
            static_dir.path().join("css/main.css"),
            "body { margin: 0; }\n",
        )
        .unwrap();

        let config = test_config(&provider.uri(), static_dir.path().to_path_buf());
        let state = AppState::new(config).unwrap();

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = questauth::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            provider,
            _static_dir: static_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Run GET /login and return (session cookie pair, state from the authorize link)
    pub async fn start_login(&self) -> (String, String) {
        let response = self
            .client
            .get(self.url("/login"))
            .send()
            .await
            .expect("request succeeds");
        assert_eq!(response.status(), 200);

        let cookie = session_cookie(&response).expect("login sets the session cookie");
        let body = response.text().await.expect("response body");
        let link = authorize_link(&body);
        let state = link
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .expect("authorize link carries state");

        (cookie, state)
    }

    /// Call GET /auth with the given query and cookie
    pub async fn callback(&self, query: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(&format!("/auth{query}")));
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.expect("request succeeds")
    }

    /// Decode a `name=value` cookie pair with the server's session store
    pub fn decode_session(&self, cookie: &str) -> questauth::auth::Session {
        let value = cookie
            .strip_prefix(&format!("{COOKIE_NAME}="))
            .expect("session cookie pair");
        self.state.sessions.decode(value).expect("valid session cookie")
    }

    /// Mount a token endpoint that issues `tok`
    pub async fn mock_token_ok(&self) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .mount(&self.provider)
            .await;
    }

    /// Mount a userinfo endpoint returning `body`
    pub async fn mock_userinfo(&self, status: u16, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.provider)
            .await;
    }
}

/// Build a configuration pointing at the mock provider
pub fn test_config(provider_uri: &str, static_dir: PathBuf) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        oauth: config::OAuthConfig {
            client_id: CLIENT_ID.to_string(),
            client_secret: CLIENT_SECRET.to_string(),
            redirect_url: "http://localhost:9090/auth".to_string(),
            scopes: vec!["openid".to_string(), "email".to_string()],
            auth_url: format!("{provider_uri}/authorize"),
            token_url: format!("{provider_uri}/token"),
            userinfo_url: format!("{provider_uri}/userinfo"),
            timeout_seconds: 1,
        },
        session: config::SessionConfig {
            cookie_name: COOKIE_NAME.to_string(),
            max_age_seconds: 604_800,
            secret: None,
            secure: None,
        },
        assets: config::AssetsConfig { static_dir },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Extract the `name=value` pair of the session cookie from a response
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{COOKIE_NAME}=")))
        .and_then(|value| value.split(';').next())
        .map(ToString::to_string)
}

/// Find the provider link on the rendered sign-in page
pub fn authorize_link(body: &str) -> url::Url {
    let start = body.find("href=\"http").expect("page has an absolute link") + 6;
    let end = start + body[start..].find('"').expect("link is quoted");
    let href = html_escape::decode_html_entities(&body[start..end]).into_owned();
    url::Url::parse(&href).expect("link is a URL")
}
