#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use notevibes::{
    config::Config,
    management::{CredentialStore, MemoryCredentialStore, MemoryHistoryStore},
    spotify::{
        SpotifyLink,
        client::{ApiResponse, Grant, PlayerCall, ProviderError, SpotifyApi},
    },
    types::{TokenPair, TokenResponse},
};

pub const USER: &str = "42";

/// What the fake token endpoint received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedGrant {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
}

/// Scripted provider. Replies are consumed in order; an unscripted token
/// request fails with 500 and an unscripted player call answers 500.
#[derive(Default)]
pub struct FakeSpotify {
    token_replies: Mutex<VecDeque<Result<TokenResponse, ProviderError>>>,
    api_replies: Mutex<VecDeque<Result<ApiResponse, ProviderError>>>,
    token_calls: AtomicUsize,
    api_calls: AtomicUsize,
    grants: Mutex<Vec<RecordedGrant>>,
    calls: Mutex<Vec<(PlayerCall, String)>>,
    refresh_gate: Mutex<Option<Arc<Notify>>>,
    refresh_started: Notify,
}

impl FakeSpotify {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_token(&self, access: &str, refresh: Option<&str>, expires_in: i64) {
        self.token_replies
            .lock()
            .unwrap()
            .push_back(Ok(token_response(access, refresh, expires_in)));
    }

    pub fn push_token_reply(&self, reply: TokenResponse) {
        self.token_replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn push_token_error(&self, status: u16, body: &str) {
        self.token_replies
            .lock()
            .unwrap()
            .push_back(Err(ProviderError::Status {
                status,
                body: body.to_string(),
            }));
    }

    pub fn push_token_network_error(&self) {
        self.token_replies
            .lock()
            .unwrap()
            .push_back(Err(ProviderError::Network("operation timed out".into())));
    }

    pub fn push_api(&self, status: u16, body: &str) {
        self.api_replies
            .lock()
            .unwrap()
            .push_back(Ok(ApiResponse::new(status, body)));
    }

    pub fn push_api_network_error(&self) {
        self.api_replies
            .lock()
            .unwrap()
            .push_back(Err(ProviderError::Network("connection reset".into())));
    }

    /// Parks the next refresh-token request after it took its scripted
    /// reply, until the returned gate is notified.
    pub fn gate_next_refresh(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.refresh_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once a gated refresh request is parked.
    pub async fn refresh_parked(&self) {
        self.refresh_started.notified().await;
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::SeqCst)
    }

    pub fn grants(&self) -> Vec<RecordedGrant> {
        self.grants.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn bearer_tokens(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl SpotifyApi for FakeSpotify {
    async fn request_token(&self, grant: Grant<'_>) -> Result<TokenResponse, ProviderError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);

        let recorded = match grant {
            Grant::AuthorizationCode {
                code,
                redirect_uri,
                code_verifier,
            } => RecordedGrant {
                grant_type: grant.grant_type().to_string(),
                code: Some(code.to_string()),
                redirect_uri: Some(redirect_uri.to_string()),
                code_verifier: code_verifier.map(str::to_string),
                refresh_token: None,
            },
            Grant::RefreshToken { refresh_token } => RecordedGrant {
                grant_type: grant.grant_type().to_string(),
                code: None,
                redirect_uri: None,
                code_verifier: None,
                refresh_token: Some(refresh_token.to_string()),
            },
        };
        let is_refresh = recorded.grant_type == "refresh_token";
        self.grants.lock().unwrap().push(recorded);

        let reply = self
            .token_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::Status {
                    status: 500,
                    body: "unscripted token request".into(),
                })
            });

        let gate = if is_refresh {
            self.refresh_gate.lock().unwrap().take()
        } else {
            None
        };
        if let Some(gate) = gate {
            self.refresh_started.notify_one();
            gate.notified().await;
        }

        reply
    }

    async fn call(
        &self,
        call: &PlayerCall,
        access_token: &str,
    ) -> Result<ApiResponse, ProviderError> {
        self.api_calls.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((call.clone(), access_token.to_string()));

        self.api_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ApiResponse::new(500, "unscripted player call")))
    }
}

pub fn token_response(access: &str, refresh: Option<&str>, expires_in: i64) -> TokenResponse {
    TokenResponse {
        access_token: access.to_string(),
        token_type: Some("Bearer".into()),
        scope: None,
        expires_in,
        refresh_token: refresh.map(str::to_string),
    }
}

pub fn test_config() -> Config {
    Config::new("client-id", Some("client-secret".into()))
}

pub struct Harness {
    pub fake: Arc<FakeSpotify>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub history: Arc<MemoryHistoryStore>,
    pub link: SpotifyLink,
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: Config) -> Harness {
    let fake = FakeSpotify::new();
    let credentials = Arc::new(MemoryCredentialStore::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let link = SpotifyLink::new(
        Arc::new(config),
        fake.clone(),
        credentials.clone(),
        history.clone(),
    );

    Harness {
        fake,
        credentials,
        history,
        link,
    }
}

impl Harness {
    /// Stores a credential for [`USER`] expiring `expires_in` from now
    /// (negative for an already expired token).
    pub async fn connect(&self, access: &str, refresh: &str, expires_in: chrono::Duration) {
        let pair = TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            scope: Some("user-read-playback-state".into()),
        };
        self.credentials
            .upsert(USER, &pair, Utc::now() + expires_in)
            .await
            .unwrap();
    }

    pub async fn connect_valid(&self) {
        self.connect("access-1", "refresh-1", chrono::Duration::hours(1))
            .await;
    }

    pub async fn connect_expired(&self) {
        self.connect("access-1", "refresh-1", chrono::Duration::seconds(-1))
            .await;
    }
}

pub fn assert_close(actual: DateTime<Utc>, expected: DateTime<Utc>, tolerance: Duration) {
    let diff = (actual - expected).num_milliseconds().unsigned_abs();
    assert!(
        diff <= tolerance.as_millis() as u64,
        "{} is not within {:?} of {}",
        actual,
        tolerance,
        expected
    );
}

pub fn playing_payload(track_id: &str, is_playing: bool) -> String {
    serde_json::json!({
        "is_playing": is_playing,
        "progress_ms": 42_000,
        "shuffle_state": false,
        "repeat_state": "off",
        "device": {
            "id": "device-1",
            "name": "Kitchen speaker",
            "type": "Speaker",
            "volume_percent": 55
        },
        "item": {
            "id": track_id,
            "name": "Windowlicker",
            "uri": format!("spotify:track:{}", track_id),
            "duration_ms": 367_000,
            "artists": [{ "name": "Aphex Twin" }, { "name": "Guest" }],
            "album": {
                "name": "Windowlicker EP",
                "images": [
                    { "url": "https://img.example/large.jpg" },
                    { "url": "https://img.example/small.jpg" }
                ]
            }
        }
    })
    .to_string()
}
