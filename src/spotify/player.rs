use std::sync::Arc;

use crate::{
    Error, Result,
    spotify::{
        client::{ApiResponse, PlayerCall, SpotifyApi},
        history::HistoryRecorder,
        tokens::TokenRefresher,
    },
    types::{GetUserPlaylistsResponse, PlayerState, PlaylistPage, Profile, SpotifyPlayback},
};

/// Page size requested from `/me/playlists`.
pub const PLAYLIST_LIMIT: u32 = 50;

/// Proxies playback commands through the user's stored credential.
///
/// Every operation follows the same template: obtain a valid token, call the
/// provider, and on a `401` force exactly one refresh and retry once with the
/// fresh token. A second rejection disconnects the user and is surfaced as
/// [`Error::UpstreamAuth`].
pub struct PlaybackProxy {
    api: Arc<dyn SpotifyApi>,
    tokens: Arc<TokenRefresher>,
    history: Arc<HistoryRecorder>,
}

impl PlaybackProxy {
    /// Creates a proxy over the provider client, the user's tokens and the
    /// history recorder fed by [`PlaybackProxy::player_state`].
    pub fn new(
        api: Arc<dyn SpotifyApi>,
        tokens: Arc<TokenRefresher>,
        history: Arc<HistoryRecorder>,
    ) -> Self {
        Self {
            api,
            tokens,
            history,
        }
    }

    /// Starts or resumes playback.
    ///
    /// # Arguments
    ///
    /// * `user_id` - The notes-app user whose credential is used
    /// * `uri` - Track to play; `None` resumes the current context
    /// * `device_id` - Target device; `None` uses the active one
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] when the user has no usable credential
    /// - [`Error::UpstreamAuth`] when the provider rejects the token even
    ///   after one refresh; the credential is deleted
    /// - [`Error::Upstream`] for any other provider failure
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// link.player
    ///     .play("42", Some("spotify:track:4uLU6hMCjMI75M1A2tKUQC".into()), None)
    ///     .await?;
    /// ```
    pub async fn play(
        &self,
        user_id: &str,
        uri: Option<String>,
        device_id: Option<String>,
    ) -> Result<()> {
        self.execute(user_id, &PlayerCall::Play { uri, device_id })
            .await
            .map(drop)
    }

    /// Pauses playback. Fails like [`PlaybackProxy::play`].
    pub async fn pause(&self, user_id: &str, device_id: Option<String>) -> Result<()> {
        self.execute(user_id, &PlayerCall::Pause { device_id })
            .await
            .map(drop)
    }

    /// Skips to the next track. Fails like [`PlaybackProxy::play`].
    pub async fn next(&self, user_id: &str, device_id: Option<String>) -> Result<()> {
        self.execute(user_id, &PlayerCall::Next { device_id })
            .await
            .map(drop)
    }

    /// Skips to the previous track. Fails like [`PlaybackProxy::play`].
    pub async fn previous(&self, user_id: &str, device_id: Option<String>) -> Result<()> {
        self.execute(user_id, &PlayerCall::Previous { device_id })
            .await
            .map(drop)
    }

    /// Current playback, normalized. No active device yields
    /// [`PlayerState::idle`]. A playing track is handed to the history
    /// recorder; recorder failures never fail this call.
    pub async fn player_state(&self, user_id: &str) -> Result<PlayerState> {
        let response = self.execute(user_id, &PlayerCall::State).await?;
        if response.is_no_content() {
            return Ok(PlayerState::idle());
        }

        let state = PlayerState::from(response.json::<SpotifyPlayback>()?);
        if let Some(track) = state.now_playing() {
            self.history.record_if_new(user_id, track).await;
        }
        Ok(state)
    }

    /// The user's playlists, first [`PLAYLIST_LIMIT`] entries.
    ///
    /// # Returns
    ///
    /// A [`PlaylistPage`] whose `total` is the provider's total count, which
    /// may exceed the number of returned items.
    pub async fn playlists(&self, user_id: &str) -> Result<PlaylistPage> {
        let response = self
            .execute(user_id, &PlayerCall::Playlists { limit: PLAYLIST_LIMIT })
            .await?;
        let raw = response.json::<GetUserPlaylistsResponse>()?;
        let total = raw.total.unwrap_or(raw.items.len() as u64);

        Ok(PlaylistPage {
            items: raw.items.into_iter().map(Into::into).collect(),
            total,
        })
    }

    /// The connected Spotify account.
    pub async fn profile(&self, user_id: &str) -> Result<Profile> {
        self.execute(user_id, &PlayerCall::Profile).await?.json()
    }

    /// Token, call, and on `401` one forced refresh plus one retry.
    async fn execute(&self, user_id: &str, call: &PlayerCall) -> Result<ApiResponse> {
        let token = self
            .tokens
            .get_valid_access_token(user_id)
            .await?
            .ok_or(Error::NotConnected)?;

        let response = self.send(call, &token).await?;
        if !response.is_unauthorized() {
            return Self::accept(call, response);
        }

        tracing::info!(user_id, call = call.name(), "access token rejected, forcing refresh");
        let Some(fresh) = self.tokens.force_refresh(user_id, &token).await else {
            return Err(Error::UpstreamAuth);
        };

        let retried = self.send(call, &fresh).await?;
        if retried.is_unauthorized() {
            tracing::warn!(
                user_id,
                call = call.name(),
                "access token rejected after refresh, disconnecting"
            );
            if let Err(e) = self.tokens.disconnect(user_id).await {
                tracing::error!(user_id, error = %e, "cannot delete rejected credential");
            }
            return Err(Error::UpstreamAuth);
        }
        Self::accept(call, retried)
    }

    async fn send(&self, call: &PlayerCall, token: &str) -> Result<ApiResponse> {
        self.api.call(call, token).await.map_err(|e| {
            tracing::warn!(call = call.name(), error = %e, "spotify request failed");
            Error::Upstream {
                status: e.status(),
                body: e.to_string(),
            }
        })
    }

    fn accept(call: &PlayerCall, response: ApiResponse) -> Result<ApiResponse> {
        if response.is_success() {
            return Ok(response);
        }

        tracing::warn!(call = call.name(), status = response.status, "spotify returned an error");
        Err(Error::Upstream {
            status: Some(response.status),
            body: response.body,
        })
    }
}
