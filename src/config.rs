//! Configuration management for the notevibes Spotify link.
//!
//! This module handles loading and accessing configuration values from
//! environment variables and `.env` files. The configuration system follows a
//! hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the working directory
//! 3. `.env` file in the local data directory
//! 4. Application defaults (where applicable)

use std::{env, path::PathBuf, time::Duration};

use crate::{Error, Result};

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:5000";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SCOPE: &str = "user-read-private user-read-email user-read-playback-state user-modify-playback-state user-read-currently-playing streaming";
pub const DEFAULT_USER_HEADER: &str = "x-user-id";

/// Path prefix the link routes are nested under.
pub const ROUTE_PREFIX: &str = "/api/spotify";

/// Loads environment variables from `.env` files.
///
/// Looks in the working directory first and then in the platform-specific
/// local data directory under `notevibes/.env`:
/// - Linux: `~/.local/share/notevibes/.env`
/// - macOS: `~/Library/Application Support/notevibes/.env`
/// - Windows: `%LOCALAPPDATA%/notevibes/.env`
///
/// Values already present in the environment are never overwritten. Missing
/// files are not an error; a file that exists but cannot be parsed is.
pub async fn load_env() -> Result<()> {
    let _ = dotenv::dotenv();

    let mut path = data_root();
    path.push(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent).await?;
    }

    if async_fs::metadata(&path).await.is_ok() {
        dotenv::from_path(&path)
            .map_err(|e| Error::Config(format!("cannot load {}: {}", path.display(), e)))?;
    }
    Ok(())
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP listener binds to, e.g. `127.0.0.1:5000`.
    pub server_addr: String,
    /// Public base URL of the notes app; used for post-handshake redirects.
    pub app_url: String,
    pub client_id: String,
    /// `None` switches the handshake to PKCE (public client).
    pub client_secret: Option<String>,
    /// Fixed callback URL registered with the provider.
    pub redirect_uri: String,
    pub scope: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
    /// Upper bound for every outbound provider call.
    pub http_timeout: Duration,
    /// Lifetime of an unanswered authorization state token.
    pub auth_state_ttl: Duration,
    /// Minimum spacing between two history entries for the same track.
    pub history_dedup_window: Duration,
    pub data_dir: PathBuf,
    /// Header carrying the user id resolved by the notes app session layer.
    pub user_header: String,
    /// User assumed when the header is absent (single-user deployments).
    pub local_user: Option<String>,
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Fails when `SPOTIFY_CLIENT_ID` is missing or a numeric value cannot be
    /// parsed.
    pub fn from_env() -> Result<Self> {
        let server_addr = var_or("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS);
        let app_url = var("APP_URL")
            .unwrap_or_else(|| format!("http://{}", server_addr))
            .trim_end_matches('/')
            .to_string();
        let redirect_uri = var("SPOTIFY_REDIRECT_URI")
            .or_else(|| var("SPOTIFY_API_REDIRECT_URI"))
            .unwrap_or_else(|| format!("{}{}/auth/callback", app_url, ROUTE_PREFIX));

        Ok(Self {
            client_id: var("SPOTIFY_CLIENT_ID")
                .or_else(|| var("SPOTIFY_API_AUTH_CLIENT_ID"))
                .ok_or_else(|| Error::Config("SPOTIFY_CLIENT_ID must be set".into()))?,
            client_secret: var("SPOTIFY_CLIENT_SECRET")
                .or_else(|| var("SPOTIFY_API_AUTH_CLIENT_SECRET")),
            redirect_uri,
            scope: var_or("SPOTIFY_API_AUTH_SCOPE", DEFAULT_SCOPE),
            auth_url: var_or("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL),
            token_url: var_or("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL),
            api_url: var_or("SPOTIFY_API_URL", DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            http_timeout: secs("HTTP_TIMEOUT_SECS", 10)?,
            auth_state_ttl: secs("AUTH_STATE_TTL_SECS", 600)?,
            history_dedup_window: secs("HISTORY_DEDUP_SECS", 300)?,
            data_dir: var("NOTEVIBES_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(data_root),
            user_header: var_or("SESSION_USER_HEADER", DEFAULT_USER_HEADER).to_lowercase(),
            local_user: var("NOTEVIBES_LOCAL_USER"),
            server_addr,
            app_url,
        })
    }

    /// A configuration pointing at the public Spotify endpoints, suitable
    /// as a starting point for tests and embedding.
    pub fn new(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        let server_addr = DEFAULT_SERVER_ADDRESS.to_string();
        let app_url = format!("http://{}", server_addr);
        Self {
            redirect_uri: format!("{}{}/auth/callback", app_url, ROUTE_PREFIX),
            client_id: client_id.into(),
            client_secret,
            scope: DEFAULT_SCOPE.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            http_timeout: Duration::from_secs(10),
            auth_state_ttl: Duration::from_secs(600),
            history_dedup_window: Duration::from_secs(300),
            data_dir: data_root(),
            user_header: DEFAULT_USER_HEADER.to_string(),
            local_user: None,
            server_addr,
            app_url,
        }
    }

    pub fn uses_pkce(&self) -> bool {
        self.client_secret.is_none()
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("credentials.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.db")
    }
}

/// Platform-specific data directory for notevibes.
pub fn data_root() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("notevibes");
    path
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|| default.to_string())
}

fn secs(name: &str, default: u64) -> Result<Duration> {
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| Error::Config(format!("{} must be a number of seconds: {}", name, e))),
        None => Ok(Duration::from_secs(default)),
    }
}
