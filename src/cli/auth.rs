use std::time::{Duration, Instant};

use chrono::Utc;

use super::{build_link, resolve_user};
use crate::{
    config::Config, error, info, server, spotify::SpotifyLink, success,
    types::CredentialRecord, warning,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs the authorization handshake for one user from a terminal.
///
/// Starts the link server in the background with the user as the local
/// session user, opens the consent screen in the default browser and waits
/// until the callback has stored a fresh credential.
pub async fn connect(mut config: Config, user: Option<String>) {
    let user_id = resolve_user(&config, user);
    let addr = match server::parse_addr(&config.server_addr) {
        Ok(addr) => addr,
        Err(e) => error!("{}", e),
    };
    config.local_user = Some(user_id.clone());

    let link = build_link(config).await;
    let server_link = link.clone();
    tokio::spawn(async move {
        if let Err(e) = server::start_api_server(server_link, addr).await {
            warning!("Callback server stopped: {}", e);
        }
    });

    let started = Utc::now();
    let auth_url = match link.authorization.begin(&user_id) {
        Ok(url) => url,
        Err(e) => error!("Failed to build authorization URL: {}", e),
    };

    info!("Waiting for Spotify callback on {}", link.config.redirect_uri);
    if webbrowser::open(&auth_url).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            auth_url
        )
    }

    match wait_for_credential(&link, &user_id, started).await {
        Some(record) => success!(
            "Spotify connected for user {}. Token valid until {}.",
            user_id,
            record.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => error!("Authentication failed or timed out."),
    }
}

/// Polls the credential store until a record written after `started`
/// appears, or the timeout passes.
async fn wait_for_credential(
    link: &SpotifyLink,
    user_id: &str,
    started: chrono::DateTime<Utc>,
) -> Option<CredentialRecord> {
    let start = Instant::now();

    while start.elapsed() < CONNECT_TIMEOUT {
        match link.tokens.store().get(user_id).await {
            Ok(Some(record)) if record.updated_at >= started => return Some(record),
            Ok(_) => {}
            Err(e) => warning!("Cannot read credential store: {}", e),
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    None
}
