use std::{path::Path, time::Duration};

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use tokio::sync::RwLock;

use crate::{Result, types::PlayEvent};

/// Append-only playback history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Most recent event for the `(user_id, track_id)` pair.
    async fn latest(&self, user_id: &str, track_id: &str) -> Result<Option<PlayEvent>>;

    async fn append(&self, event: PlayEvent) -> Result<()>;

    /// Newest-first events of one user, at most `limit` of them.
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<PlayEvent>>;
}

fn latest_of<'a>(
    events: impl Iterator<Item = &'a PlayEvent>,
    user_id: &str,
    track_id: &str,
) -> Option<PlayEvent> {
    events
        .filter(|e| e.user_id == user_id && e.track_id == track_id)
        .max_by_key(|e| e.played_at)
        .cloned()
}

fn recent_of<'a>(
    events: impl Iterator<Item = &'a PlayEvent>,
    user_id: &str,
    limit: usize,
) -> Vec<PlayEvent> {
    let mut events: Vec<PlayEvent> = events.filter(|e| e.user_id == user_id).cloned().collect();
    events.sort_by(|a, b| b.played_at.cmp(&a.played_at));
    events.truncate(limit);
    events
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    events: RwLock<Vec<PlayEvent>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn latest(&self, user_id: &str, track_id: &str) -> Result<Option<PlayEvent>> {
        Ok(latest_of(self.events.read().await.iter(), user_id, track_id))
    }

    async fn append(&self, event: PlayEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<PlayEvent>> {
        Ok(recent_of(self.events.read().await.iter(), user_id, limit))
    }
}

/// SQLite-backed history: one append-only `play_events` table.
///
/// `latest` is answered from the `(user_id, track_id, played_at)` index, so a
/// `/player` poll costs one indexed lookup regardless of how long the history
/// has grown. `played_at` is stored as Unix milliseconds.
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct PlayEventRow {
    user_id: String,
    track_id: String,
    track_name: String,
    artist_name: String,
    album_art: Option<String>,
    played_at: i64,
}

impl From<PlayEventRow> for PlayEvent {
    fn from(row: PlayEventRow) -> Self {
        Self {
            user_id: row.user_id,
            track_id: row.track_id,
            track_name: row.track_name,
            artist_name: row.artist_name,
            album_art: row.album_art,
            played_at: DateTime::from_timestamp_millis(row.played_at).unwrap_or_default(),
        }
    }
}

const SELECT_EVENT: &str =
    "SELECT user_id, track_id, track_name, artist_name, album_art, played_at FROM play_events";

impl SqliteHistoryStore {
    /// Opens (and creates, if missing) the database at `path` and makes sure
    /// the schema exists.
    ///
    /// # Arguments
    ///
    /// * `path` - Database file, usually [`Config::history_path`](crate::config::Config::history_path)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`](crate::Error::Database) when the file cannot
    /// be opened or the schema cannot be created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS play_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                track_id TEXT NOT NULL,
                track_name TEXT NOT NULL,
                artist_name TEXT NOT NULL,
                album_art TEXT,
                played_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_play_events_user_track_played \
             ON play_events (user_id, track_id, played_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_play_events_user_played \
             ON play_events (user_id, played_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn latest(&self, user_id: &str, track_id: &str) -> Result<Option<PlayEvent>> {
        let row = sqlx::query_as::<_, PlayEventRow>(&format!(
            "{} WHERE user_id = ? AND track_id = ? ORDER BY played_at DESC LIMIT 1",
            SELECT_EVENT
        ))
        .bind(user_id)
        .bind(track_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn append(&self, event: PlayEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO play_events (
                user_id, track_id, track_name, artist_name, album_art, played_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.user_id)
        .bind(&event.track_id)
        .bind(&event.track_name)
        .bind(&event.artist_name)
        .bind(&event.album_art)
        .bind(event.played_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<PlayEvent>> {
        let rows = sqlx::query_as::<_, PlayEventRow>(&format!(
            "{} WHERE user_id = ? ORDER BY played_at DESC, id DESC LIMIT ?",
            SELECT_EVENT
        ))
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
