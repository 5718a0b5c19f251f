//! # CLI Module
//!
//! Command implementations for the `notevibes` binary. Each command builds
//! the production [`SpotifyLink`] from the loaded configuration and talks to
//! the same stores the HTTP server uses, so a CLI `disconnect` is visible to
//! a running server immediately.
//!
//! - [`serve`] - run the HTTP link service
//! - [`connect`] - run the authorization handshake from a terminal
//! - [`status`] - report (and refresh) a user's link
//! - [`disconnect`] - delete a user's credential
//! - [`history`] - print recent playback history

mod auth;
mod history;
mod status;

pub use auth::connect;
pub use history::history;
pub use status::{disconnect, status};

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::{config::Config, error, server, spotify::SpotifyLink};

/// Installs the `tracing` subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub async fn serve(config: Config) {
    if let Err(e) = server::serve(config).await {
        error!("Server stopped: {}", e);
    }
}

async fn build_link(config: Config) -> SpotifyLink {
    match SpotifyLink::from_config(config).await {
        Ok(link) => link,
        Err(e) => error!("Failed to initialise Spotify link: {}", e),
    }
}

fn resolve_user(config: &Config, user: Option<String>) -> String {
    match user.or_else(|| config.local_user.clone()) {
        Some(user) => user,
        None => error!("No user given. Pass --user or set NOTEVIBES_LOCAL_USER."),
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}
