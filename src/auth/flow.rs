//! Authorization code flow
//!
//! Implements the login flow against the configured OpenID provider.
//! Session transitions: anonymous -> pending (state stored) -> authenticated (user-id stored).

use axum::{
    Router,
    extract::{Query, State, rejection::QueryRejection},
    response::{Html, IntoResponse},
    routing::get,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::session::{STATE_KEY, Session, USER_ID_KEY};
use super::token::{STATE_TOKEN_BYTES, random_token};
use super::user::AuthorizedUser;
use crate::AppState;
use crate::error::AppError;
use crate::metrics::{CALLBACKS_TOTAL, LOGIN_ATTEMPTS_TOTAL};
use crate::web::pages;

/// Create authentication router
///
/// Routes:
/// - GET /login - Start a login attempt
/// - GET /auth - Provider callback
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/auth", get(callback))
}

// =============================================================================
// Login
// =============================================================================

/// GET /login
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in the session cookie
/// 3. Render a page linking to the provider's consent screen
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = random_token(STATE_TOKEN_BYTES)?;

    let mut session = state.sessions.load(&jar);
    session.set(STATE_KEY, csrf_state.clone());
    let jar = state.sessions.save(jar, &session)?;

    LOGIN_ATTEMPTS_TOTAL.inc();
    tracing::info!("Login attempt started");
    tracing::debug!(state = %csrf_state, "Stored session state");

    let link = state.oauth.authorize_url(&csrf_state);
    Ok((jar, Html(pages::auth_page(link.as_str()))))
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from the provider callback
///
/// All optional so that a malformed callback is reported, not rejected by the extractor.
#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token
    state: Option<String>,
    /// Error code when the user denied consent
    error: Option<String>,
}

/// GET /auth
///
/// Handles the provider redirect. Any failure aborts before the
/// session is written. An unreadable query (e.g. a repeated `state`)
/// cannot prove the login was started here, so it fails the state check.
async fn callback(
    State(state): State<AppState>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.load(&jar);

    let outcome = match query {
        Ok(Query(query)) => complete_login(&state, session, &query).await,
        Err(rejection) => {
            tracing::debug!(%rejection, "Unreadable callback query");
            Err(AppError::InvalidState)
        }
    };

    match outcome {
        Ok((session, user)) => {
            let jar = state.sessions.save(jar, &session).inspect_err(|error| {
                tracing::error!(%error, "Failed to save session");
                CALLBACKS_TOTAL.with_label_values(&["session_save"]).inc();
            })?;

            CALLBACKS_TOTAL.with_label_values(&["success"]).inc();
            tracing::info!(
                email = %user.email,
                email_verified = user.email_verified,
                "User signed in"
            );
            Ok((jar, Html(pages::welcome_page(&user.email))))
        }
        Err(error) => {
            let (_, outcome) = error.status();
            CALLBACKS_TOTAL.with_label_values(&[outcome]).inc();
            tracing::warn!(%error, "Login callback rejected");
            Err(error)
        }
    }
}

/// Validate the callback and resolve the signed-in user
///
/// Returns the session to persist. The consumed `state` is removed from it
/// so an old callback URL cannot be replayed.
async fn complete_login(
    state: &AppState,
    mut session: Session,
    query: &CallbackQuery,
) -> Result<(Session, AuthorizedUser), AppError> {
    verify_state(&session, query.state.as_deref())?;

    if let Some(error) = &query.error {
        return Err(AppError::Exchange(format!(
            "identity provider returned {error}"
        )));
    }

    let code = query.code.as_deref().unwrap_or_default();
    let token = state.oauth.exchange_code(code).await?;
    let body = state.oauth.fetch_user_info(&token).await?;
    let user = AuthorizedUser::from_slice(&body)?;

    session.remove(STATE_KEY);
    session.set(USER_ID_KEY, user.email.clone());
    Ok((session, user))
}

/// Verify the callback state matches the one stored at login
///
/// A session without a stored state never matches, even an empty query value.
fn verify_state(session: &Session, query_state: Option<&str>) -> Result<(), AppError> {
    match (session.get(STATE_KEY), query_state) {
        (Some(expected), Some(actual)) if !expected.is_empty() && expected == actual => Ok(()),
        _ => Err(AppError::InvalidState),
    }
}
