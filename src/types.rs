use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Body of a successful token endpoint response.
///
/// `refresh_token` is optional because the provider only rotates it on some
/// refreshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Absolute expiry for a response received at `received_at`.
    pub fn expires_at(&self, received_at: DateTime<Utc>) -> DateTime<Utc> {
        received_at + Duration::seconds(self.expires_in.max(0))
    }

    /// Rotated refresh token, ignoring empty strings.
    pub fn rotated_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Result of an authorization-code exchange, not yet persisted.
#[derive(Debug, Clone)]
pub struct ExchangedTokens {
    pub pair: TokenPair,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// One entry of the playback history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayEvent {
    pub user_id: String,
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    #[serde(default)]
    pub album_art: Option<String>,
    pub played_at: DateTime<Utc>,
}

#[derive(Tabled)]
pub struct HistoryTableRow {
    pub played_at: String,
    pub track: String,
    pub artists: String,
}

impl From<&PlayEvent> for HistoryTableRow {
    fn from(event: &PlayEvent) -> Self {
        Self {
            played_at: event.played_at.format("%Y-%m-%d %H:%M").to_string(),
            track: event.track_name.clone(),
            artists: event.artist_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    pub uri: Option<String>,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub album_art: Option<String>,
    pub duration_ms: Option<u64>,
}

impl Track {
    pub fn artist_name(&self) -> String {
        self.artists.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    pub kind: Option<String>,
    pub volume_percent: Option<u8>,
}

/// Normalized playback state returned by `GET /player`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub is_playing: bool,
    pub progress_ms: Option<u64>,
    pub shuffle: Option<bool>,
    pub repeat: Option<String>,
    pub track: Option<Track>,
    pub device: Option<Device>,
}

impl PlayerState {
    /// The neutral state used when no device is active.
    pub fn idle() -> Self {
        Self {
            is_playing: false,
            progress_ms: None,
            shuffle: None,
            repeat: None,
            track: None,
            device: None,
        }
    }

    /// The track that should be recorded in history, if any.
    pub fn now_playing(&self) -> Option<&Track> {
        if self.is_playing { self.track.as_ref() } else { None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlayback {
    #[serde(default)]
    pub is_playing: bool,
    pub progress_ms: Option<u64>,
    pub shuffle_state: Option<bool>,
    pub repeat_state: Option<String>,
    pub item: Option<SpotifyItem>,
    pub device: Option<SpotifyDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyItem {
    pub id: Option<String>,
    pub name: String,
    pub uri: Option<String>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub album: Option<SpotifyAlbum>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyAlbum {
    pub name: String,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyDevice {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub volume_percent: Option<u8>,
}

impl From<SpotifyPlayback> for PlayerState {
    fn from(raw: SpotifyPlayback) -> Self {
        // Local files and some podcast items come without an id; they cannot
        // be keyed in history and are reported without a track.
        let track = raw.item.and_then(|item| {
            let id = item.id?;
            let (album, album_art) = match item.album {
                Some(album) => {
                    let art = album.images.into_iter().next().map(|i| i.url);
                    (Some(album.name), art)
                }
                None => (None, None),
            };
            Some(Track {
                id,
                name: item.name,
                uri: item.uri,
                artists: item.artists.into_iter().map(|a| a.name).collect(),
                album,
                album_art,
                duration_ms: item.duration_ms,
            })
        });

        Self {
            is_playing: raw.is_playing,
            progress_ms: raw.progress_ms,
            shuffle: raw.shuffle_state,
            repeat: raw.repeat_state,
            track,
            device: raw.device.map(|d| Device {
                id: d.id,
                name: d.name,
                kind: d.kind,
                volume_percent: d.volume_percent,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUserPlaylistsResponse {
    pub items: Vec<SpotifyPlaylist>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub uri: Option<String>,
    pub public: Option<bool>,
    #[serde(default)]
    pub collaborative: bool,
    #[serde(default)]
    pub images: Option<Vec<SpotifyImage>>,
    pub tracks: Option<SpotifyPlaylistTracks>,
    pub owner: Option<SpotifyOwner>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylistTracks {
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyOwner {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub uri: Option<String>,
    pub public: Option<bool>,
    pub collaborative: bool,
    pub image: Option<String>,
    pub track_count: Option<u64>,
    pub owner: Option<String>,
}

impl From<SpotifyPlaylist> for Playlist {
    fn from(raw: SpotifyPlaylist) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            description: raw.description.filter(|d| !d.is_empty()),
            uri: raw.uri,
            public: raw.public,
            collaborative: raw.collaborative,
            image: raw.images.and_then(|i| i.into_iter().next()).map(|i| i.url),
            track_count: raw.tracks.map(|t| t.total),
            owner: raw.owner.and_then(|o| o.display_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistPage {
    pub items: Vec<Playlist>,
    pub total: u64,
}

/// The connected account, as reported by the provider's `/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub product: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequest {
    pub uri: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub connected: bool,
}
