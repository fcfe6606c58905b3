//! Buffered GET forwarding to the Trello API and avatar host.
//!
//! Bodies are small test payloads and are buffered whole. An upstream reply
//! with an error status is relayed verbatim (exact status and body); only a
//! failure of the call itself (DNS, refused connection, timeout) becomes a
//! local 500 with a JSON error body.

use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use thiserror::Error;
use tracing::Instrument;

use crate::config::{AvatarConfig, TrelloConfig};

/// Cache hint attached to successfully relayed avatars.
const AVATAR_CACHE_CONTROL: &str = "public, max-age=3600";

/// A fully buffered upstream reply, any status code.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// The upstream call itself failed; there is no reply to relay.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Forward a Trello API request: GET `{base_url}/{resource}[?query]`.
///
/// The query string is forwarded byte-for-byte, so repeated keys survive as
/// repeated entries. No headers are added; an API key must already be in
/// the query string.
pub async fn trello(
    client: &reqwest::Client,
    config: &TrelloConfig,
    resource: &str,
    query: Option<&str>,
) -> Response {
    let url = trello_url(&config.base_url, resource, query);
    let span = tracing::info_span!(
        "trello_forward",
        url = %url,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    async {
        match fetch(client, &url).await {
            Ok(upstream) => relay_trello(upstream),
            Err(e) => {
                tracing::error!(error = %e, "Trello upstream call failed");
                failure_response(&e)
            }
        }
    }
    .instrument(span)
    .await
}

/// Forward an avatar request: GET `{base_url}/{key}`.
///
/// The key is opaque; query parameters are never forwarded.
pub async fn avatar(client: &reqwest::Client, config: &AvatarConfig, key: &str) -> Response {
    let url = avatar_url(&config.base_url, key);
    let span = tracing::info_span!(
        "avatar_forward",
        url = %url,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    async {
        match fetch(client, &url).await {
            Ok(upstream) => relay_avatar(upstream),
            Err(e) => {
                tracing::error!(error = %e, "Avatar upstream call failed");
                failure_response(&e)
            }
        }
    }
    .instrument(span)
    .await
}

fn trello_url(base_url: &str, resource: &str, query: Option<&str>) -> String {
    let query = query.map(|q| format!("?{q}")).unwrap_or_default();
    format!("{}/{resource}{query}", base_url.trim_end_matches('/'))
}

fn avatar_url(base_url: &str, key: &str) -> String {
    format!("{}/{key}", base_url.trim_end_matches('/'))
}

/// Issue the GET and buffer the reply.
async fn fetch(client: &reqwest::Client, url: &str) -> Result<UpstreamResponse, FetchError> {
    let start = Instant::now();

    let response = client.get(url).send().await.map_err(classify_error)?;

    let status = response.status();
    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
    let body = response.bytes().await.map_err(classify_error)?;

    let latency = start.elapsed().as_millis() as u64;
    tracing::Span::current().record("status", status.as_u16());
    tracing::Span::current().record("latency_ms", latency);
    tracing::info!(
        status = status.as_u16(),
        latency_ms = latency,
        "Forward complete"
    );

    Ok(UpstreamResponse {
        status,
        content_type,
        body,
    })
}

fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e)
    } else {
        FetchError::Transport(e)
    }
}

/// Relay rules for the Trello API: on success the upstream content-type
/// (defaulting to JSON), on an upstream error status the exact status and
/// body reported as JSON.
fn relay_trello(upstream: UpstreamResponse) -> Response {
    let UpstreamResponse {
        status,
        content_type,
        body,
    } = upstream;

    let content_type = if status.is_client_error() || status.is_server_error() {
        HeaderValue::from_static("application/json")
    } else {
        content_type.unwrap_or_else(|| HeaderValue::from_static("application/json"))
    };

    relay_response(status, content_type, None, body)
}

/// Relay rules for avatars: on success the upstream content-type (defaulting
/// to PNG) plus a one-hour cache hint, on an upstream error status the exact
/// status and body as plain text.
fn relay_avatar(upstream: UpstreamResponse) -> Response {
    let UpstreamResponse {
        status,
        content_type,
        body,
    } = upstream;

    if status.is_client_error() || status.is_server_error() {
        return relay_response(status, HeaderValue::from_static("text/plain"), None, body);
    }

    relay_response(
        status,
        content_type.unwrap_or_else(|| HeaderValue::from_static("image/png")),
        Some(HeaderValue::from_static(AVATAR_CACHE_CONTROL)),
        body,
    )
}

fn relay_response(
    status: StatusCode,
    content_type: HeaderValue,
    cache_control: Option<HeaderValue>,
    body: Bytes,
) -> Response {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type);

    if let Some(cache) = cache_control {
        builder = builder.header(header::CACHE_CONTROL, cache);
    }

    builder.body(Body::from(body)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build response");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
    })
}

/// 500 with `{"error": "<failure description>"}`.
fn failure_response(error: &FetchError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(serde_json::json!({ "error": error.to_string() })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trello_url_joins_base_and_resource() {
        assert_eq!(
            trello_url("https://api.trello.com", "boards/123", None),
            "https://api.trello.com/boards/123"
        );
    }

    #[test]
    fn trello_url_appends_query_verbatim() {
        assert_eq!(
            trello_url(
                "https://api.trello.com",
                "search",
                Some("idBoards=1&idBoards=2")
            ),
            "https://api.trello.com/search?idBoards=1&idBoards=2"
        );
    }

    #[test]
    fn avatar_url_tolerates_trailing_slash_on_base() {
        assert_eq!(
            avatar_url("https://trello-members.s3.amazonaws.com/", "abc123.png"),
            "https://trello-members.s3.amazonaws.com/abc123.png"
        );
    }

    #[test]
    fn trello_relay_defaults_content_type_to_json() {
        let response = relay_trello(UpstreamResponse {
            status: StatusCode::OK,
            content_type: None,
            body: Bytes::from_static(b"{}"),
        });

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn trello_relay_forces_json_on_upstream_error() {
        let response = relay_trello(UpstreamResponse {
            status: StatusCode::NOT_FOUND,
            content_type: Some(HeaderValue::from_static("text/html")),
            body: Bytes::from_static(b"{\"error\":\"not found\"}"),
        });

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn avatar_relay_adds_cache_hint_on_success() {
        let response = relay_avatar(UpstreamResponse {
            status: StatusCode::OK,
            content_type: None,
            body: Bytes::from_static(b"\x89PNG"),
        });

        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=3600"
        );
    }

    #[test]
    fn avatar_relay_reports_upstream_error_as_plain_text() {
        let response = relay_avatar(UpstreamResponse {
            status: StatusCode::FORBIDDEN,
            content_type: Some(HeaderValue::from_static("application/xml")),
            body: Bytes::from_static(b"denied"),
        });

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }

    #[tokio::test]
    async fn failure_response_wraps_description_in_json() {
        // A malformed URL yields a reqwest error without touching the network.
        let err = reqwest::Client::new()
            .get("http://")
            .send()
            .await
            .unwrap_err();
        let response = failure_response(&FetchError::Transport(err));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(!value["error"].as_str().unwrap().is_empty());
    }
}
