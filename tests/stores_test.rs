use chrono::{Duration, Utc};
use notevibes::{
    management::{CredentialStore, FileCredentialStore, HistoryStore, SqliteHistoryStore},
    types::{PlayEvent, TokenPair},
};
use tempfile::TempDir;

fn pair(access: &str, refresh: &str) -> TokenPair {
    TokenPair {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        scope: Some("streaming".to_string()),
    }
}

fn event(user_id: &str, track_id: &str, minutes_ago: i64) -> PlayEvent {
    PlayEvent {
        user_id: user_id.to_string(),
        track_id: track_id.to_string(),
        track_name: track_id.to_uppercase(),
        artist_name: "Artist".to_string(),
        album_art: None,
        played_at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

#[tokio::test]
async fn test_file_credentials_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("credentials.json");
    let expires_at = Utc::now() + Duration::hours(1);

    let store = FileCredentialStore::new(&path);
    assert!(store.get("42").await.unwrap().is_none());
    let written = store
        .upsert("42", &pair("access-1", "refresh-1"), expires_at)
        .await
        .unwrap();

    let reopened = FileCredentialStore::new(&path);
    let read = reopened.get("42").await.unwrap().unwrap();
    assert_eq!(read, written);
    assert_eq!(read.scope.as_deref(), Some("streaming"));
}

#[tokio::test]
async fn test_file_credentials_upsert_overwrites_and_delete_removes() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path().join("credentials.json"));
    let expires_at = Utc::now() + Duration::hours(1);

    store
        .upsert("42", &pair("access-1", "refresh-1"), expires_at)
        .await
        .unwrap();
    store
        .upsert("7", &pair("other", "other-refresh"), expires_at)
        .await
        .unwrap();
    store
        .upsert("42", &pair("access-2", "refresh-1"), expires_at)
        .await
        .unwrap();

    assert_eq!(
        store.get("42").await.unwrap().unwrap().access_token,
        "access-2"
    );
    assert!(store.delete("42").await.unwrap());
    assert!(!store.delete("42").await.unwrap());
    assert!(store.get("42").await.unwrap().is_none());
    assert!(store.get("7").await.unwrap().is_some());
}

#[tokio::test]
async fn test_empty_credentials_file_reads_as_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, "").unwrap();

    let store = FileCredentialStore::new(&path);
    assert!(store.get("42").await.unwrap().is_none());
}

#[tokio::test]
async fn test_corrupt_credentials_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, "{not json").unwrap();

    let store = FileCredentialStore::new(&path);
    assert!(store.get("42").await.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_credentials_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    let store = FileCredentialStore::new(&path);
    store
        .upsert("42", &pair("access-1", "refresh-1"), Utc::now())
        .await
        .unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[tokio::test]
async fn test_concurrent_credential_writes_leave_no_temp_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    let expires_at = Utc::now() + Duration::hours(1);
    let first = FileCredentialStore::new(&path);
    let second = FileCredentialStore::new(&path);

    let pair_1 = pair("access-1", "refresh-1");
    let pair_7 = pair("access-7", "refresh-7");
    let (a, b) = tokio::join!(
        first.upsert("42", &pair_1, expires_at),
        second.upsert("7", &pair_7, expires_at),
    );
    a.unwrap();
    b.unwrap();

    let reopened = FileCredentialStore::new(&path);
    assert!(
        reopened.get("42").await.unwrap().is_some() || reopened.get("7").await.unwrap().is_some()
    );
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["credentials.json".to_string()]);
}

#[tokio::test]
async fn test_sqlite_history_latest_and_recent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("history.db");

    let store = SqliteHistoryStore::open(&path).await.unwrap();
    store.append(event("42", "a", 20)).await.unwrap();
    store.append(event("42", "a", 2)).await.unwrap();
    store.append(event("42", "b", 10)).await.unwrap();
    store.append(event("7", "a", 1)).await.unwrap();

    let reopened = SqliteHistoryStore::open(&path).await.unwrap();
    let latest = reopened.latest("42", "a").await.unwrap().unwrap();
    assert!(Utc::now() - latest.played_at < Duration::minutes(3));

    let recent = reopened.recent("42", 10).await.unwrap();
    let tracks: Vec<&str> = recent.iter().map(|e| e.track_id.as_str()).collect();
    assert_eq!(tracks, vec!["a", "b", "a"]);

    assert!(reopened.latest("42", "missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_sqlite_history_keeps_event_fields() {
    let dir = TempDir::new().unwrap();
    let store = SqliteHistoryStore::open(dir.path().join("history.db"))
        .await
        .unwrap();
    let mut played = event("42", "track-1", 0);
    played.album_art = Some("https://i.scdn.co/image/cover".to_string());
    store.append(played.clone()).await.unwrap();

    let read = store.latest("42", "track-1").await.unwrap().unwrap();
    assert_eq!(read.track_name, "TRACK-1");
    assert_eq!(read.artist_name, "Artist");
    assert_eq!(read.album_art, played.album_art);
    assert_eq!(
        read.played_at.timestamp_millis(),
        played.played_at.timestamp_millis()
    );

    assert_eq!(store.recent("42", 0).await.unwrap().len(), 0);
    assert!(store.recent("7", 10).await.unwrap().is_empty());
}
