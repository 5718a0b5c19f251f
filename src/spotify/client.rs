//! The provider seam.
//!
//! [`SpotifyApi`] is everything the link layer needs from Spotify: the token
//! endpoint and a handful of player REST calls. [`HttpSpotifyApi`] speaks to
//! the real service with `reqwest`; tests substitute scripted fakes.

use async_trait::async_trait;
use reqwest::{
    Client, Method,
    header::{CONTENT_LENGTH, HeaderValue},
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

use crate::{Error, Result, config::Config, types::TokenResponse};

/// Grant presented to the token endpoint.
///
/// `AuthorizationCode` finishes a handshake (with the PKCE verifier for
/// public clients); `RefreshToken` renews an expired access token.
#[derive(Debug, Clone, Copy)]
pub enum Grant<'a> {
    AuthorizationCode {
        code: &'a str,
        redirect_uri: &'a str,
        code_verifier: Option<&'a str>,
    },
    RefreshToken {
        refresh_token: &'a str,
    },
}

impl Grant<'_> {
    /// The `grant_type` form value.
    pub fn grant_type(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode { .. } => "authorization_code",
            Grant::RefreshToken { .. } => "refresh_token",
        }
    }
}

/// One call against the provider's player REST surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    State,
    Play {
        uri: Option<String>,
        device_id: Option<String>,
    },
    Pause {
        device_id: Option<String>,
    },
    Next {
        device_id: Option<String>,
    },
    Previous {
        device_id: Option<String>,
    },
    Playlists {
        limit: u32,
    },
    Profile,
}

impl PlayerCall {
    /// Short name used in log events.
    pub fn name(&self) -> &'static str {
        match self {
            PlayerCall::State => "player_state",
            PlayerCall::Play { .. } => "play",
            PlayerCall::Pause { .. } => "pause",
            PlayerCall::Next { .. } => "next",
            PlayerCall::Previous { .. } => "previous",
            PlayerCall::Playlists { .. } => "playlists",
            PlayerCall::Profile => "profile",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            PlayerCall::State | PlayerCall::Playlists { .. } | PlayerCall::Profile => Method::GET,
            PlayerCall::Play { .. } | PlayerCall::Pause { .. } => Method::PUT,
            PlayerCall::Next { .. } | PlayerCall::Previous { .. } => Method::POST,
        }
    }

    /// Path relative to the configured API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            PlayerCall::State => "/me/player",
            PlayerCall::Play { .. } => "/me/player/play",
            PlayerCall::Pause { .. } => "/me/player/pause",
            PlayerCall::Next { .. } => "/me/player/next",
            PlayerCall::Previous { .. } => "/me/player/previous",
            PlayerCall::Playlists { .. } => "/me/playlists",
            PlayerCall::Profile => "/me",
        }
    }

    /// Query parameters for the call.
    ///
    /// # Returns
    ///
    /// `device_id` for the transport commands when one was given and is not
    /// empty, `limit` for playlists, nothing otherwise.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            PlayerCall::Play { device_id, .. }
            | PlayerCall::Pause { device_id }
            | PlayerCall::Next { device_id }
            | PlayerCall::Previous { device_id } => device_id
                .iter()
                .filter(|id| !id.is_empty())
                .map(|id| ("device_id", id.clone()))
                .collect(),
            PlayerCall::Playlists { limit } => vec![("limit", limit.to_string())],
            PlayerCall::State | PlayerCall::Profile => Vec::new(),
        }
    }

    /// JSON body. Only `Play` with a non-empty URI has one
    /// (`{"uris": [uri]}`).
    pub fn body(&self) -> Option<Value> {
        match self {
            PlayerCall::Play { uri: Some(uri), .. } if !uri.is_empty() => {
                Some(json!({ "uris": [uri] }))
            }
            _ => None,
        }
    }
}

/// Raw provider response; status interpretation is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The provider's "credential rejected" signal.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// The provider's empty-success signal (no active device on `/me/player`).
    pub fn is_no_content(&self) -> bool {
        self.status == 204 || (self.is_success() && self.body.trim().is_empty())
    }

    /// Decodes the body.
    ///
    /// # Errors
    ///
    /// [`Error::Upstream`] carrying the status when the body does not match
    /// `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| Error::Upstream {
            status: Some(self.status),
            body: format!("unexpected response body: {}", e),
        })
    }
}

/// Failure talking to the provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Connection failure, TLS failure or timeout.
    #[error("request failed: {0}")]
    Network(String),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("cannot decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// HTTP status, when the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}

/// The provider surface consumed by the link layer.
///
/// [`HttpSpotifyApi`] is the production implementation; the seam exists so
/// token and playback logic can be driven by scripted responses.
#[async_trait]
pub trait SpotifyApi: Send + Sync {
    /// POSTs a grant to the token endpoint. Any non-2xx status is an error.
    async fn request_token(
        &self,
        grant: Grant<'_>,
    ) -> std::result::Result<TokenResponse, ProviderError>;

    /// Issues a player call with the bearer token. Non-2xx statuses are
    /// returned as responses, only transport failures are errors.
    async fn call(
        &self,
        call: &PlayerCall,
        access_token: &str,
    ) -> std::result::Result<ApiResponse, ProviderError>;
}

/// [`SpotifyApi`] over HTTPS.
///
/// Confidential clients authenticate to the token endpoint with HTTP Basic
/// (`client_id:client_secret`); public clients send `client_id` in the form
/// and rely on PKCE.
pub struct HttpSpotifyApi {
    http: Client,
    client_id: String,
    client_secret: Option<String>,
    token_url: String,
    api_url: String,
}

impl HttpSpotifyApi {
    /// Builds a client whose every request is bounded by
    /// `config.http_timeout`.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies credentials, endpoint URLs and the timeout
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the TLS backend cannot be initialized.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::from_env()?;
    /// let api = HttpSpotifyApi::new(&config)?;
    /// ```
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_url: config.token_url.clone(),
            api_url: config.api_url.clone(),
        })
    }
}

#[async_trait]
impl SpotifyApi for HttpSpotifyApi {
    async fn request_token(
        &self,
        grant: Grant<'_>,
    ) -> std::result::Result<TokenResponse, ProviderError> {
        let mut form: Vec<(&str, &str)> = vec![("grant_type", grant.grant_type())];
        match grant {
            Grant::AuthorizationCode {
                code,
                redirect_uri,
                code_verifier,
            } => {
                form.push(("code", code));
                form.push(("redirect_uri", redirect_uri));
                if let Some(verifier) = code_verifier {
                    form.push(("code_verifier", verifier));
                }
            }
            Grant::RefreshToken { refresh_token } => {
                form.push(("refresh_token", refresh_token));
            }
        }

        let mut request = self.http.post(&self.token_url);
        match &self.client_secret {
            Some(secret) => request = request.basic_auth(&self.client_id, Some(secret)),
            None => form.push(("client_id", self.client_id.as_str())),
        }

        let response = request.form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn call(
        &self,
        call: &PlayerCall,
        access_token: &str,
    ) -> std::result::Result<ApiResponse, ProviderError> {
        let url = format!("{}{}", self.api_url, call.path());
        let method = call.method();
        let mut request = self.http.request(method.clone(), &url).bearer_auth(access_token);

        let query = call.query();
        if !query.is_empty() {
            request = request.query(&query);
        }

        match call.body() {
            Some(body) => request = request.json(&body),
            // the player endpoints answer 411 to a bodiless PUT/POST without a length
            None if method != Method::GET => {
                request = request.header(CONTENT_LENGTH, HeaderValue::from_static("0"))
            }
            None => {}
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }
}
