//! Axum HTTP server: router, listener, browser launch, graceful shutdown.

use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::middleware;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::cors;
use crate::proxy::forward;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub trello_client: reqwest::Client,
    pub avatar_client: reqwest::Client,
}

/// Build the router: two GET proxy routes, static files for everything else,
/// cross-origin headers on all of it.
///
/// Only GET is proxied. Other methods on the proxy prefixes fall through to
/// the static-file service (which rejects them), a documented limitation.
pub fn build_router(state: AppState) -> Router {
    let static_files =
        ServeDir::new(&state.config.server.static_root).append_index_html_on_directories(true);

    Router::new()
        .route(
            "/api/trello/{*resource}",
            get(handle_trello_proxy).fallback_service(static_files.clone()),
        )
        .route(
            "/api/avatar/{*key}",
            get(handle_avatar_proxy).fallback_service(static_files.clone()),
        )
        .fallback_service(static_files)
        .layer(middleware::from_fn(cors::apply))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Bind, optionally open the browser at the test page, and serve.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let listen_addr = state.config.server.listen_address.clone();
    let test_page = state.config.server.test_page.clone();
    let open_browser = state.config.server.open_browser;

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    let port = listener.local_addr()?.port();
    let local_url = format!("http://localhost:{port}/");
    tracing::info!(address = %listen_addr, url = %local_url, "trello-devserver listening");

    if open_browser {
        let page_url = format!("{local_url}{test_page}");
        if let Err(e) = open::that_detached(&page_url) {
            tracing::warn!(error = %e, url = %page_url, "Failed to open browser");
        }
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("trello-devserver shut down gracefully");
    Ok(())
}

/// GET /api/trello/{resource}: forward to the Trello API with the query
/// string intact.
async fn handle_trello_proxy(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    forward::trello(
        &state.trello_client,
        &state.config.trello,
        &resource,
        query.as_deref(),
    )
    .await
}

/// GET /api/avatar/{key}: forward to the avatar host, dropping any query.
async fn handle_avatar_proxy(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Response {
    forward::avatar(&state.avatar_client, &state.config.avatar, &key).await
}

/// Wait for SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, draining connections...");
}
