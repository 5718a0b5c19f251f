use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Handshake data issued by `begin` and consumed by the callback.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub state: String,
    /// PKCE verifier, present when the client has no secret.
    pub code_verifier: Option<String>,
    issued_at: Instant,
}

impl PendingAuthorization {
    pub fn new(state: String, code_verifier: Option<String>) -> Self {
        Self {
            state,
            code_verifier,
            issued_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.issued_at.elapsed() >= ttl
    }
}

/// In-flight authorization handshakes, one per user session.
///
/// Entries are single use: [`take`](Self::take) removes the entry whether or
/// not the caller ends up accepting it, and entries older than the TTL are
/// never returned.
pub struct PendingAuthorizations {
    entries: DashMap<String, PendingAuthorization>,
    ttl: Duration,
}

impl PendingAuthorizations {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Stores a new handshake for the user, replacing any earlier one.
    pub fn issue(&self, user_id: &str, pending: PendingAuthorization) {
        self.purge_expired();
        self.entries.insert(user_id.to_string(), pending);
    }

    /// Removes the user's pending handshake.
    ///
    /// # Returns
    ///
    /// The handshake if one was issued and its TTL has not run out. Either
    /// way the entry is gone afterwards, so a state token is usable once.
    pub fn take(&self, user_id: &str) -> Option<PendingAuthorization> {
        let (_, pending) = self.entries.remove(user_id)?;
        if pending.is_expired(self.ttl) {
            return None;
        }
        Some(pending)
    }

    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, p| !p.is_expired(ttl));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
