//! trello-devserver: local static file server with CORS proxying to the
//! Trello API and avatar host for browser test pages.

mod config;
mod cors;
mod logging;
mod proxy;
mod server;

use std::time::Duration;

use config::ProxyConfig;
use server::AppState;

fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1).cloned())
        .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
        .or_else(|| std::env::var("TRELLO_DEVSERVER_CONFIG").ok())
        .unwrap_or_else(|| "trello-devserver.toml".to_string());

    let listen_override = args
        .iter()
        .position(|a| a == "--listen")
        .and_then(|i| args.get(i + 1).cloned());

    let root_override = args
        .iter()
        .position(|a| a == "--root")
        .and_then(|i| args.get(i + 1).cloned());

    let no_browser = args.iter().any(|a| a == "--no-browser");

    // Load configuration
    let mut config = ProxyConfig::load(&config_path)?;

    // Apply CLI overrides (take precedence over TOML and env vars)
    if let Some(addr) = listen_override {
        config.server.listen_address = addr;
    }
    if let Some(root) = root_override {
        config.server.static_root = root.into();
    }
    if no_browser {
        config.server.open_browser = false;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        logging::init(&config.log_level);

        tracing::info!(
            config_path = %config_path,
            listen_address = %config.server.listen_address,
            static_root = %config.server.static_root.display(),
            trello_base_url = %config.trello.base_url,
            avatar_base_url = %config.avatar.base_url,
            "Starting trello-devserver"
        );

        run(config).await
    })
}

async fn run(config: ProxyConfig) -> anyhow::Result<()> {
    // One client per upstream category, each with its own timeout
    let trello_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.trello.timeout_secs))
        .build()?;

    let avatar_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.avatar.timeout_secs))
        .build()?;

    let state = AppState {
        config,
        trello_client,
        avatar_client,
    };

    server::run(state).await
}
