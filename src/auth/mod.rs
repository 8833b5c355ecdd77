//! OpenID Connect authentication
//!
//! Handles:
//! - Random state and secret generation
//! - Encrypted cookie sessions
//! - Provider client (authorize, token, userinfo)
//! - Login and callback handlers

pub mod client;
mod flow;
pub mod session;
pub mod token;
pub mod user;

pub use client::{AccessToken, OAuthClient};
pub use flow::auth_router;
pub use session::{Session, SessionStore};
pub use user::AuthorizedUser;
