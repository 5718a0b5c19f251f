//! # Spotify Integration Module
//!
//! The link between a notevibes account and Spotify. It owns the OAuth token
//! lifecycle and proxies playback commands through the stored credential.
//!
//! ## Architecture
//!
//! ```text
//! HTTP handlers (api) / CLI
//!          ↓
//! PlaybackProxy ──────→ HistoryRecorder ──→ HistoryStore
//!          ↓
//! TokenRefresher ←──── AuthorizationFlow
//!          ↓
//! CredentialStore          SpotifyApi (HTTP, reqwest)
//! ```
//!
//! - [`client`] - the provider seam: token endpoint and player REST calls
//! - [`tokens`] - fast-path token reads, single-flight refresh, eviction
//! - [`authorize`] - state-token handshake (client secret or PKCE)
//! - [`player`] - play/pause/next/previous/state/playlists/profile with one
//!   forced refresh on rejection
//! - [`history`] - deduplicated "now playing" log
//!
//! ## Failure policy
//!
//! A refresh that fails for any reason deletes the credential; the user must
//! authorize again. Playback calls are retried at most once, and only after a
//! `401`. History writes never fail the request that triggered them.

pub mod authorize;
pub mod client;
pub mod history;
pub mod player;
pub mod tokens;

use std::sync::Arc;

use crate::{
    Result,
    config::Config,
    management::{CredentialStore, FileCredentialStore, HistoryStore, SqliteHistoryStore},
};

use authorize::AuthorizationFlow;
use client::{HttpSpotifyApi, SpotifyApi};
use history::HistoryRecorder;
use player::PlaybackProxy;
use tokens::TokenRefresher;

/// All link components wired over one provider client and one pair of
/// stores.
#[derive(Clone)]
pub struct SpotifyLink {
    pub config: Arc<Config>,
    pub tokens: Arc<TokenRefresher>,
    pub authorization: Arc<AuthorizationFlow>,
    pub player: Arc<PlaybackProxy>,
    pub history: Arc<HistoryRecorder>,
}

impl SpotifyLink {
    pub fn new(
        config: Arc<Config>,
        api: Arc<dyn SpotifyApi>,
        credentials: Arc<dyn CredentialStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let tokens = Arc::new(TokenRefresher::new(Arc::clone(&api), credentials));
        let history = Arc::new(HistoryRecorder::new(history, config.history_dedup_window));
        let authorization = Arc::new(AuthorizationFlow::new(
            Arc::clone(&config),
            Arc::clone(&tokens),
        ));
        let player = Arc::new(PlaybackProxy::new(
            api,
            Arc::clone(&tokens),
            Arc::clone(&history),
        ));

        Self {
            config,
            tokens,
            authorization,
            player,
            history,
        }
    }

    /// The production wiring: HTTP provider client, the JSON credential
    /// store and the SQLite history in the configured data directory.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built or the history database
    /// cannot be opened.
    pub async fn from_config(config: Config) -> Result<Self> {
        let api = Arc::new(HttpSpotifyApi::new(&config)?);
        let credentials = Arc::new(FileCredentialStore::new(config.credentials_path()));
        let history = Arc::new(SqliteHistoryStore::open(config.history_path()).await?);
        Ok(Self::new(Arc::new(config), api, credentials, history))
    }
}
