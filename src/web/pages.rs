//! HTML views
//!
//! Every dynamic value passes through `html_escape` before it reaches markup.

use html_escape::{encode_double_quoted_attribute, encode_text};

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title} - Quest</title>
    <link rel="stylesheet" href="/css/main.css">
</head>
<body>
    <main>
{body}
    </main>
</body>
</html>
"#,
        title = encode_text(title),
    )
}

/// GET /
pub fn index_page(user_id: Option<&str>) -> String {
    let body = match user_id {
        Some(email) => format!(
            r#"        <h1>Quest</h1>
        <p>Signed in as <strong>{}</strong>.</p>"#,
            encode_text(email)
        ),
        None => r#"        <h1>Quest</h1>
        <p>You are not signed in.</p>
        <a href="/login">Sign in</a>"#
            .to_string(),
    };
    layout("Home", &body)
}

/// GET /login
pub fn auth_page(link: &str) -> String {
    let body = format!(
        r#"        <h1>Sign in</h1>
        <p>Continue to your identity provider to sign in.</p>
        <a class="login" href="{}">Sign in with Google</a>"#,
        encode_double_quoted_attribute(link)
    );
    layout("Sign in", &body)
}

/// GET /auth on success
pub fn welcome_page(email: &str) -> String {
    let body = format!(
        r#"        <h1>Welcome</h1>
        <p>You are signed in as <strong>{}</strong>.</p>
        <a href="/">Continue</a>"#,
        encode_text(email)
    );
    layout("Welcome", &body)
}

/// Rendered for every `AppError`
pub fn error_page(message: &str) -> String {
    let body = format!(
        r#"        <h1>Something went wrong</h1>
        <p class="error">{}</p>
        <a href="/login">Try signing in again</a>"#,
        encode_text(message)
    );
    layout("Error", &body)
}
