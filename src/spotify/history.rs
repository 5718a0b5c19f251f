use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    Result,
    management::HistoryStore,
    types::{PlayEvent, Track},
};

/// Best-effort log of what the user listened to.
///
/// A track is written again only once the dedup window has passed since its
/// most recent entry. The look-up and the insert happen under one lock so two
/// overlapping `/player` polls cannot both insert.
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
    window: chrono::Duration,
    lock: Mutex<()>,
}

impl HistoryRecorder {
    /// # Arguments
    ///
    /// * `store` - Where events are kept
    /// * `window` - Minimum gap between two entries for the same track; an
    ///   out-of-range value falls back to five minutes
    pub fn new(store: Arc<dyn HistoryStore>, window: Duration) -> Self {
        Self {
            store,
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::minutes(5)),
            lock: Mutex::new(()),
        }
    }

    /// Records `track` unless it was recorded within the window.
    ///
    /// Returns whether an event was written. Errors are logged and reported
    /// as `false`.
    pub async fn record_if_new(&self, user_id: &str, track: &Track) -> bool {
        match self.try_record(user_id, track).await {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(user_id, track_id = %track.id, error = %e, "cannot record playback history");
                false
            }
        }
    }

    /// Newest-first listing of at most `limit` events for the user.
    ///
    /// # Errors
    ///
    /// Store failures are returned as is, unlike [`HistoryRecorder::record_if_new`].
    pub async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<PlayEvent>> {
        self.store.recent(user_id, limit).await
    }

    async fn try_record(&self, user_id: &str, track: &Track) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let now = Utc::now();

        if let Some(last) = self.store.latest(user_id, &track.id).await? {
            if now - last.played_at <= self.window {
                return Ok(false);
            }
        }

        self.store
            .append(PlayEvent {
                user_id: user_id.to_string(),
                track_id: track.id.clone(),
                track_name: track.name.clone(),
                artist_name: track.artist_name(),
                album_art: track.album_art.clone(),
                played_at: now,
            })
            .await?;
        tracing::debug!(user_id, track_id = %track.id, "playback recorded");
        Ok(true)
    }
}
