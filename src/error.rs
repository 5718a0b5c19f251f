//! Error taxonomy for the Spotify link layer.
//!
//! Every fallible operation in the crate returns [`Result`]. The variants
//! mirror what a caller can act on: reconnect the account, retry later, or
//! report an internal fault. The HTTP boundary maps them to status codes in
//! [`crate::api::error`].

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No credential on file for the user.
    #[error("not connected to Spotify")]
    NotConnected,

    /// The state returned by the authorization callback did not match the
    /// one issued at redirect time, or it was missing or expired.
    #[error("authorization state mismatch")]
    StateMismatch,

    /// The provider reported an error on the consent screen (for example the
    /// user pressed "cancel").
    #[error("authorization denied by provider: {0}")]
    AuthorizationDenied(String),

    /// The token endpoint rejected an exchange, or could not be reached.
    #[error("token exchange failed (status {status:?}): {body}")]
    ProviderExchange { status: Option<u16>, body: String },

    /// A playback call was rejected even after one forced refresh.
    #[error("Spotify session expired")]
    UpstreamAuth,

    /// Any other non-success provider response, or a transport failure.
    #[error("Spotify API error (status {status:?}): {body}")]
    Upstream { status: Option<u16>, body: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Whether the user has to run the authorization handshake again.
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, Error::NotConnected | Error::UpstreamAuth)
    }
}
