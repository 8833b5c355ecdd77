//! E2E tests for the login flow

mod common;

use common::{CLIENT_ID, TestServer, session_cookie};
use questauth::auth::session::{STATE_KEY, USER_ID_KEY};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_index_renders_without_setting_cookie() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    assert!(session_cookie(&response).is_none());
    let body = response.text().await.expect("response body");
    assert!(body.contains(r#"href="/login""#));
}

#[tokio::test]
async fn test_login_stores_state_and_renders_authorize_link() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/login"))
        .send()
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), 200);

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie header")
        .to_string();
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("Max-Age=604800"));
    assert!(set_cookie.contains("HttpOnly"));

    let cookie = session_cookie(&response).expect("session cookie");
    let body = response.text().await.expect("response body");
    let link = common::authorize_link(&body);

    assert_eq!(link.path(), "/authorize");
    let param = |name: &str| {
        link.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };
    assert_eq!(param("client_id").as_deref(), Some(CLIENT_ID));
    assert_eq!(
        param("redirect_uri").as_deref(),
        Some("http://localhost:9090/auth")
    );
    assert_eq!(param("response_type").as_deref(), Some("code"));
    assert_eq!(param("scope").as_deref(), Some("openid email"));

    let session = server.decode_session(&cookie);
    assert_eq!(session.get(STATE_KEY), param("state").as_deref());
}

#[tokio::test]
async fn test_each_login_uses_a_fresh_state() {
    let server = TestServer::new().await;

    let (_, first) = server.start_login().await;
    let (_, second) = server.start_login().await;

    assert_ne!(first, second);
}

#[tokio::test]
async fn test_callback_with_valid_state_signs_user_in() {
    let server = TestServer::new().await;
    server.mock_token_ok().await;
    server
        .mock_userinfo(
            200,
            serde_json::json!({
                "sub": "110169484474386276334",
                "name": "A B",
                "email": "a@b.com",
                "email_verified": true,
                "picture": "https://img.example.com/a.png"
            }),
        )
        .await;

    let (cookie, state) = server.start_login().await;
    let response = server
        .callback(&format!("?code=good-code&state={state}"), Some(&cookie))
        .await;

    assert_eq!(response.status(), 200);
    let new_cookie = session_cookie(&response).expect("session is saved");
    let body = response.text().await.expect("response body");
    assert!(body.contains("a@b.com"));

    let session = server.decode_session(&new_cookie);
    assert_eq!(session.get(USER_ID_KEY), Some("a@b.com"));
    assert_eq!(session.get(STATE_KEY), None);

    // The signed-in session is visible on the index page
    let index = server
        .client
        .get(server.url("/"))
        .header("Cookie", &new_cookie)
        .send()
        .await
        .expect("request succeeds");
    assert!(index.text().await.unwrap().contains("Signed in as"));
}

#[tokio::test]
async fn test_callback_cannot_be_replayed() {
    let server = TestServer::new().await;
    server.mock_token_ok().await;
    server
        .mock_userinfo(200, serde_json::json!({ "email": "a@b.com" }))
        .await;

    let (cookie, state) = server.start_login().await;
    let query = format!("?code=good-code&state={state}");
    let first = server.callback(&query, Some(&cookie)).await;
    assert_eq!(first.status(), 200);
    let signed_in = session_cookie(&first).expect("session is saved");

    let replay = server.callback(&query, Some(&signed_in)).await;
    assert_eq!(replay.status(), 401);
}

#[tokio::test]
async fn test_callback_rejects_mismatched_state() {
    let server = TestServer::new().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server.provider)
        .await;

    let (cookie, _state) = server.start_login().await;

    for code in ["good-code", "", "anything%20else"] {
        let response = server
            .callback(&format!("?code={code}&state=forged"), Some(&cookie))
            .await;
        assert_eq!(response.status(), 401);
        assert!(session_cookie(&response).is_none());
        let body = response.text().await.unwrap();
        assert!(body.contains("Invalid session state."));
    }
}

#[tokio::test]
async fn test_callback_without_session_cookie_is_unauthorized() {
    let server = TestServer::new().await;

    let response = server.callback("?code=dummy&state=dummy", None).await;
    assert_eq!(response.status(), 401);

    let response = server.callback("?code=dummy&state=", None).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_callback_with_failing_exchange_leaves_session_unset() {
    let server = TestServer::new().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server.provider)
        .await;

    let (cookie, state) = server.start_login().await;
    let response = server
        .callback(&format!("?code=good-code&state={state}"), Some(&cookie))
        .await;

    assert_eq!(response.status(), 400);
    assert!(session_cookie(&response).is_none());

    let session = server.decode_session(&cookie);
    assert_eq!(session.get(USER_ID_KEY), None);
}

#[tokio::test]
async fn test_callback_with_error_body_is_rejected() {
    let server = TestServer::new().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": "invalid_grant"
        })))
        .mount(&server.provider)
        .await;

    let (cookie, state) = server.start_login().await;
    let response = server
        .callback(&format!("?code=used-code&state={state}"), Some(&cookie))
        .await;

    assert_eq!(response.status(), 400);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_callback_without_code_is_an_exchange_failure() {
    let server = TestServer::new().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server.provider)
        .await;

    let (cookie, state) = server.start_login().await;
    let response = server
        .callback(&format!("?state={state}"), Some(&cookie))
        .await;

    assert_eq!(response.status(), 400);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_callback_with_denied_consent_is_rejected() {
    let server = TestServer::new().await;

    let (cookie, state) = server.start_login().await;
    let response = server
        .callback(&format!("?error=access_denied&state={state}"), Some(&cookie))
        .await;

    assert_eq!(response.status(), 400);
    let body = response.text().await.unwrap();
    assert!(body.contains("access_denied"));
}

#[tokio::test]
async fn test_callback_with_failing_userinfo_is_rejected() {
    let server = TestServer::new().await;
    server.mock_token_ok().await;
    server
        .mock_userinfo(401, serde_json::json!({ "error": "invalid_token" }))
        .await;

    let (cookie, state) = server.start_login().await;
    let response = server
        .callback(&format!("?code=good-code&state={state}"), Some(&cookie))
        .await;

    assert_eq!(response.status(), 400);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_callback_with_slow_provider_times_out() {
    let server = TestServer::new().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(3)))
        .mount(&server.provider)
        .await;

    let (cookie, state) = server.start_login().await;
    let response = server
        .callback(&format!("?code=good-code&state={state}"), Some(&cookie))
        .await;

    assert_eq!(response.status(), 400);
    let body = response.text().await.unwrap();
    assert!(body.contains("please sign in again"));
}

#[tokio::test]
async fn test_callback_with_userinfo_missing_email_is_parse_error() {
    let server = TestServer::new().await;
    server.mock_token_ok().await;
    server
        .mock_userinfo(200, serde_json::json!({ "sub": "1", "name": "No Email" }))
        .await;

    let (cookie, state) = server.start_login().await;
    let response = server
        .callback(&format!("?code=good-code&state={state}"), Some(&cookie))
        .await;

    assert_eq!(response.status(), 400);
    let body = response.text().await.unwrap();
    assert!(body.contains("Malformed identity payload"));
}

#[tokio::test]
async fn test_callback_with_repeated_state_is_unauthorized() {
    let server = TestServer::new().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server.provider)
        .await;

    let (cookie, state) = server.start_login().await;
    let response = server
        .callback(
            &format!("?code=x&state={state}&state=forged"),
            Some(&cookie),
        )
        .await;

    assert_eq!(response.status(), 401);
    assert!(session_cookie(&response).is_none());
    let body = response.text().await.unwrap();
    assert!(body.contains("Invalid session state."));
    assert!(body.contains("<html"));
}

#[tokio::test]
async fn test_callback_with_userinfo_error_body_is_rejected() {
    let server = TestServer::new().await;
    server.mock_token_ok().await;
    server
        .mock_userinfo(
            200,
            serde_json::json!({
                "error": "invalid_token",
                "error_description": "Token expired"
            }),
        )
        .await;

    let (cookie, state) = server.start_login().await;
    let response = server
        .callback(&format!("?code=good-code&state={state}"), Some(&cookie))
        .await;

    assert_eq!(response.status(), 400);
    assert!(session_cookie(&response).is_none());
    let body = response.text().await.unwrap();
    assert!(body.contains("Userinfo request failed"));
    assert!(!body.contains("Malformed identity payload"));
}

#[tokio::test]
async fn test_callback_with_oversized_session_is_not_saved() {
    let server = TestServer::new().await;
    server.mock_token_ok().await;
    let email = format!("{}@b.com", "a".repeat(5000));
    server
        .mock_userinfo(200, serde_json::json!({ "email": email }))
        .await;

    let (cookie, state) = server.start_login().await;
    let response = server
        .callback(&format!("?code=good-code&state={state}"), Some(&cookie))
        .await;

    assert_eq!(response.status(), 400);
    assert!(session_cookie(&response).is_none());
    let body = response.text().await.unwrap();
    assert!(body.contains("Session could not be saved"));
}
