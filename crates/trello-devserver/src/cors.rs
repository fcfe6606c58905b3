//! Cross-origin response headers for the browser test page.
//!
//! The test page is served from `localhost` but calls back into this server
//! for proxied Trello data, so every response (static files, proxied
//! successes, proxied errors) carries the same permissive headers. Preflight
//! OPTIONS requests are answered locally without touching the router.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};

/// Methods the browser is allowed to send cross-origin.
pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

/// Request headers the browser is allowed to send cross-origin.
pub const ALLOWED_HEADERS: &str = "Content-Type";

/// How long (seconds) the browser may cache a preflight result.
pub const MAX_AGE_SECS: &str = "3600";

/// Middleware wrapping the whole router.
///
/// OPTIONS requests to any path short-circuit to a preflight response; all
/// other responses get the cross-origin headers stamped on after the inner
/// service runs.
pub async fn apply(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return preflight_response();
    }

    let mut response = next.run(request).await;
    insert_cors_headers(response.headers_mut());
    response
}

/// 200 with an empty body, the cross-origin headers, and the preflight
/// cache hint. No upstream call is ever made for a preflight.
fn preflight_response() -> Response {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    insert_cors_headers(headers);
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(MAX_AGE_SECS),
    );
    response
}

fn insert_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
}
