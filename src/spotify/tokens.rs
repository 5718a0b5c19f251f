use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::{
    Error, Result,
    management::CredentialStore,
    spotify::client::{Grant, ProviderError, SpotifyApi},
    types::{CredentialRecord, ExchangedTokens, TokenPair},
};

/// Keeps a valid access token on file for every connected user.
///
/// The stored expiry is the only thing consulted on the fast path: as long
/// as `now < expires_at` the stored token is returned without touching the
/// network. Refreshes are serialized per user; a caller that waited on the
/// lock re-reads the record and reuses the token its predecessor obtained.
///
/// A failed refresh evicts the credential. The user is then "disconnected",
/// and only a new authorization handshake can bring the link back.
pub struct TokenRefresher {
    api: Arc<dyn SpotifyApi>,
    store: Arc<dyn CredentialStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TokenRefresher {
    pub fn new(api: Arc<dyn SpotifyApi>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            api,
            store,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Exchanges an authorization code for the initial token pair.
    ///
    /// Performs exactly one token-endpoint call. The result is not persisted;
    /// the handshake decides where it goes.
    ///
    /// # Errors
    ///
    /// [`Error::ProviderExchange`] when the endpoint answers non-2xx, cannot
    /// be reached, or omits the refresh token.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<ExchangedTokens> {
        let grant = Grant::AuthorizationCode {
            code,
            redirect_uri,
            code_verifier,
        };

        let response = self.api.request_token(grant).await.map_err(|e| {
            tracing::warn!(error = %e, "authorization code exchange failed");
            Error::ProviderExchange {
                status: e.status(),
                body: match e {
                    ProviderError::Status { body, .. } => body,
                    other => other.to_string(),
                },
            }
        })?;
        let received_at = Utc::now();

        let Some(refresh_token) = response.rotated_refresh_token() else {
            return Err(Error::ProviderExchange {
                status: None,
                body: "token response did not include a refresh token".into(),
            });
        };

        Ok(ExchangedTokens {
            pair: TokenPair {
                access_token: response.access_token.clone(),
                refresh_token: refresh_token.to_string(),
                scope: response.scope.clone(),
            },
            expires_at: response.expires_at(received_at),
        })
    }

    /// Persists the pair obtained by a completed handshake.
    ///
    /// Takes the user's refresh lock, so a refresh that was started with the
    /// previous credential finishes (or gives up) before the new pair lands.
    ///
    /// # Arguments
    ///
    /// * `user_id` - The notes-app user that authorized
    /// * `exchanged` - Result of [`TokenRefresher::exchange_authorization_code`]
    ///
    /// # Returns
    ///
    /// The stored record, replacing any earlier one for the user.
    pub async fn store_authorized(
        &self,
        user_id: &str,
        exchanged: &ExchangedTokens,
    ) -> Result<CredentialRecord> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        self.store
            .upsert(user_id, &exchanged.pair, exchanged.expires_at)
            .await
    }

    /// Returns a usable access token, refreshing it when it has expired.
    ///
    /// The stored expiry alone decides validity; a valid token is returned
    /// without any network call.
    ///
    /// # Returns
    ///
    /// `Ok(None)` means the user is not connected, either because no record
    /// exists or because the refresh just failed and evicted it.
    ///
    /// # Errors
    ///
    /// Only store failures surface as errors; provider failures end in
    /// `Ok(None)`.
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<Option<String>> {
        let Some(record) = self.store.get(user_id).await? else {
            return Ok(None);
        };
        if record.is_valid_at(Utc::now()) {
            return Ok(Some(record.access_token));
        }

        let lock = self.user_lock(user_id);
        let token = {
            let _guard = lock.lock().await;
            match self.store.get(user_id).await? {
                None => None,
                Some(current) if current.is_valid_at(Utc::now()) => Some(current.access_token),
                Some(current) => self.refresh_locked(current).await,
            }
        };

        if token.is_none() {
            self.release_lock(user_id, lock);
        }
        Ok(token)
    }

    /// Unconditionally refreshes the user's token.
    ///
    /// Returns the new access token, or `None` when the user has no record or
    /// the refresh failed (the record is then deleted).
    pub async fn refresh(&self, user_id: &str) -> Option<String> {
        let lock = self.user_lock(user_id);
        let token = {
            let _guard = lock.lock().await;
            match self.read_for_refresh(user_id).await {
                Some(record) => self.refresh_locked(record).await,
                None => None,
            }
        };

        if token.is_none() {
            self.release_lock(user_id, lock);
        }
        token
    }

    /// Refresh after the provider rejected `rejected_token`.
    ///
    /// If a concurrent request already replaced that token with one that is
    /// still valid, the replacement is returned without a second exchange.
    pub async fn force_refresh(&self, user_id: &str, rejected_token: &str) -> Option<String> {
        let lock = self.user_lock(user_id);
        let token = {
            let _guard = lock.lock().await;
            match self.read_for_refresh(user_id).await {
                Some(record)
                    if record.access_token != rejected_token
                        && record.is_valid_at(Utc::now()) =>
                {
                    tracing::debug!(user_id, "token already refreshed by a concurrent request");
                    Some(record.access_token)
                }
                Some(record) => self.refresh_locked(record).await,
                None => None,
            }
        };

        if token.is_none() {
            self.release_lock(user_id, lock);
        }
        token
    }

    /// Deletes the user's credential.
    ///
    /// # Returns
    ///
    /// Whether a credential existed.
    pub async fn disconnect(&self, user_id: &str) -> Result<bool> {
        let lock = self.user_lock(user_id);
        let deleted = {
            let _guard = lock.lock().await;
            self.store.delete(user_id).await
        };

        self.release_lock(user_id, lock);
        deleted
    }

    /// Number of users with a refresh lock entry.
    pub fn tracked_users(&self) -> usize {
        self.locks.len()
    }

    async fn read_for_refresh(&self, user_id: &str) -> Option<CredentialRecord> {
        match self.store.get(user_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(user_id, error = %e, "cannot read credential for refresh");
                None
            }
        }
    }

    /// Must be called with the user's lock held. The store is only written
    /// (upsert or eviction) while it still holds the refresh token that was
    /// sent.
    async fn refresh_locked(&self, record: CredentialRecord) -> Option<String> {
        let user_id = record.user_id.as_str();
        let grant = Grant::RefreshToken {
            refresh_token: &record.refresh_token,
        };

        let result = self.api.request_token(grant).await;

        // Another writer (a new handshake, another process sharing the store)
        // may have replaced the credential while the token call was in flight.
        let current = self.read_for_refresh(user_id).await;
        let sent = Some(record.refresh_token.as_str());
        if current.as_ref().map(|c| c.refresh_token.as_str()) != sent {
            tracing::info!(user_id, "credential replaced during refresh, keeping the stored one");
            return current
                .filter(|c| c.is_valid_at(Utc::now()))
                .map(|c| c.access_token);
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "token refresh failed, disconnecting");
                self.evict(user_id).await;
                return None;
            }
        };
        let received_at = Utc::now();

        let pair = TokenPair {
            access_token: response.access_token.clone(),
            refresh_token: response
                .rotated_refresh_token()
                .unwrap_or(&record.refresh_token)
                .to_string(),
            scope: response.scope.clone().or_else(|| record.scope.clone()),
        };

        match self
            .store
            .upsert(user_id, &pair, response.expires_at(received_at))
            .await
        {
            Ok(updated) => {
                tracing::info!(user_id, expires_at = %updated.expires_at, "access token refreshed");
                Some(updated.access_token)
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "cannot persist refreshed token");
                None
            }
        }
    }

    async fn evict(&self, user_id: &str) {
        if let Err(e) = self.store.delete(user_id).await {
            tracing::error!(user_id, error = %e, "cannot delete credential after failed refresh");
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Drops the user's lock entry once nobody but the map and `held` refer
    /// to it. Waiters keep their clone, so a contended entry stays.
    fn release_lock(&self, user_id: &str, held: Arc<Mutex<()>>) {
        self.locks.remove_if(user_id, |_, entry| {
            Arc::ptr_eq(entry, &held) && Arc::strong_count(entry) == 2
        });
    }
}
