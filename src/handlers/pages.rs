//! Browser-facing placeholders and liveness.
//!
//! These are not wrapped by `protected`; `/app` relies on the gate alone.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::Query;
use axum::http::Request;
use axum::response::Html;
use axum::Json;
use serde_json::{json, Value};

use crate::http::request::ResolvedSession;

/// Minimal escaping for text interpolated into HTML.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// `GET /auth/signin?next=...`
pub async fn sign_in(Query(params): Query<HashMap<String, String>>) -> Html<String> {
    let next = params.get("next").map(String::as_str).unwrap_or("/app");
    Html(format!(
        "<!doctype html><title>Sign in</title><main><h1>Sign in to Briefly</h1>\
         <p data-next=\"{next}\">After signing in you will return to {next}</p></main>",
        next = escape(next)
    ))
}

/// `GET /app` and `GET /app/{*path}`
pub async fn app_shell(req: Request<Body>) -> Html<String> {
    let email = req
        .extensions()
        .get::<ResolvedSession>()
        .and_then(|session| session.identity.as_ref())
        .map(|identity| escape(&identity.email))
        .unwrap_or_default();
    Html(format!(
        "<!doctype html><title>Briefly</title><main><p>Signed in as {}</p><p>{}</p></main>",
        email,
        escape(req.uri().path())
    ))
}
