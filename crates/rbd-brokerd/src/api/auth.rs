//! HTTP basic authentication gate.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::json;

use super::AppState;

const REALM: &str = r#"Basic realm="rbd-broker""#;

/// Reject requests whose basic credentials do not match the configured ones.
pub async fn basic_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    tracing::debug!(path = %path, "Checking basic auth");

    match basic_credentials(request.headers()) {
        Some((user, pass)) if state.credentials.matches(&user, &pass) => {
            tracing::debug!(path = %path, user = %user, "Authenticated");
            next.run(request).await
        }
        _ => {
            tracing::info!(path = %path, "Invalid basic auth credentials");
            unauthorized()
        }
    }
}

/// Decode `Authorization: Basic <base64(user:pass)>`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn unauthorized() -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Unauthorized" })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(REALM));
    response
}
