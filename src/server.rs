use std::net::SocketAddr;

use axum::{Router, routing::get};
use tokio::net::TcpListener;

use crate::{
    Error, Result, api,
    config::{Config, ROUTE_PREFIX},
    spotify::SpotifyLink,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub link: SpotifyLink,
}

/// The complete router: `/health` at the root and the link routes under
/// [`ROUTE_PREFIX`].
pub fn app(link: SpotifyLink) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .nest(ROUTE_PREFIX, api::router())
        .with_state(AppState { link })
}

/// Wires the production components from `config` and serves until the
/// listener fails.
pub async fn serve(config: Config) -> Result<()> {
    let addr = parse_addr(&config.server_addr)?;
    let link = SpotifyLink::from_config(config).await?;
    start_api_server(link, addr).await
}

pub async fn start_api_server(link: SpotifyLink, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, data_dir = %link.config.data_dir.display(), "spotify link listening");

    axum::serve(listener, app(link)).await?;
    Ok(())
}

pub fn parse_addr(raw: &str) -> Result<SocketAddr> {
    raw.parse()
        .map_err(|e| Error::Config(format!("failed to parse server address {}: {}", raw, e)))
}
