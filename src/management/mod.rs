//! Persistence for the link layer.
//!
//! Credentials and play history live behind async traits so the token
//! refresher and the playback proxy never know whether they talk to the
//! in-memory maps used by tests or the stores written by `serve` (a JSON
//! document for credentials, SQLite for the play history).
//! Pending authorization handshakes are process-local and short-lived.

mod credentials;
mod history;
mod state;

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use rand::{Rng, distr::Alphanumeric};
use serde::{Serialize, de::DeserializeOwned};

pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use history::{HistoryStore, MemoryHistoryStore, SqliteHistoryStore};
pub use state::{PendingAuthorization, PendingAuthorizations};

use crate::Result;

/// Reads a JSON document, treating a missing file as the default value.
async fn read_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match async_fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(T::default()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Writes a JSON document through a temporary file so readers never see a
/// half-written store.
///
/// The temporary name is unique per write, so a CLI command and a running
/// server sharing the data directory never clobber each other's file. On
/// unix the file is restricted to the owner before any content is written.
async fn write_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp = temp_path(path);

    async_fs::write(&tmp, b"").await?;
    restrict_permissions(&tmp).await?;
    async_fs::write(&tmp, json).await?;
    if let Err(e) = async_fs::rename(&tmp, path).await {
        let _ = async_fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{}.{}.tmp", std::process::id(), suffix));
    path.with_file_name(name)
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    async_fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
