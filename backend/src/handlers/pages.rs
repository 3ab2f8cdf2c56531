//! Placeholder pages behind the page gate
//!
//! The dashboard itself is rendered elsewhere; these exist so the gate has
//! something to protect and so redirects have a target.

use axum::{
    extract::{Extension, Query},
    response::Html,
};
use serde::Deserialize;

use crate::middleware::Identity;

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1>{body}</body></html>"
    ))
}

fn escape(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            c => c.to_string(),
        })
        .collect()
}

fn signed_in_as(identity: &Identity) -> String {
    format!(
        "<p>{} ({})</p>",
        escape(identity.email.as_deref().unwrap_or("")),
        identity.role
    )
}

/// GET /dashboard
pub async fn dashboard(Extension(identity): Extension<Identity>) -> Html<String> {
    page("Canopy dashboard", &signed_in_as(&identity))
}

/// GET /admin
pub async fn admin_console(Extension(identity): Extension<Identity>) -> Html<String> {
    page("Canopy admin", &signed_in_as(&identity))
}

#[derive(Debug, Deserialize)]
pub struct LoginPageQuery {
    pub redirect: Option<String>,
}

/// GET /login
pub async fn login_page(Query(query): Query<LoginPageQuery>) -> Html<String> {
    let redirect = query.redirect.unwrap_or_else(|| "/dashboard".to_string());
    page(
        "Sign in",
        &format!(
            "<form method=\"post\" action=\"/api/auth/login\" data-redirect=\"{}\"></form>",
            escape(&redirect)
        ),
    )
}

/// GET /unauthorized
pub async fn unauthorized() -> Html<String> {
    page("Unauthorized", "<p>权限不足</p>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
