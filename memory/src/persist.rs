//! JSON-file persistence shared by the stores.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::warn;

use crate::error::{Result, StorageError};

/// Suffix given to records that failed to decode on load.
pub(crate) const QUARANTINE_EXTENSION: &str = "corrupt";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File name for a record key. Keys are arbitrary strings, so they are
/// hashed rather than used as paths.
pub(crate) fn record_path(root: &Path, key: &str) -> PathBuf {
    let digest = Sha256::digest(key.as_bytes());
    root.join(format!("{digest:x}.json"))
}

pub(crate) async fn ensure_dir(root: &Path) -> Result<()> {
    fs::create_dir_all(root)
        .await
        .map_err(|e| StorageError::CreateDirectory(format!("{}: {e}", root.display())))?;
    Ok(())
}

/// Write `value` to `path` atomically using a temp file. Each write gets its
/// own temp file so concurrent writers never share one.
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;

    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path = path.with_extension(format!("json.{}-{seq}.tmp", std::process::id()));
    fs::write(&temp_path, &content)
        .await
        .map_err(|e| StorageError::WriteFile(format!("{}: {e}", temp_path.display())))?;

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(StorageError::WriteFile(format!("{}: {e}", path.display())).into());
    }

    Ok(())
}

pub(crate) async fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::DeleteFile(format!("{}: {e}", path.display())).into()),
    }
}

/// Load every `*.json` file under `root`.
///
/// A file that cannot be decoded is renamed to `*.corrupt` and skipped, so a
/// later write to the same key never overwrites it. Read errors are
/// surfaced.
pub(crate) async fn read_all<T: DeserializeOwned>(root: &Path) -> Result<Vec<T>> {
    let mut entries = fs::read_dir(root)
        .await
        .map_err(|e| StorageError::ReadFile(format!("{}: {e}", root.display())))?;

    let mut records = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::ReadFile(format!("{e}")))?
    {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| StorageError::ReadFile(format!("{}: {e}", path.display())))?;

        match serde_json::from_str(&content) {
            Ok(record) => records.push(record),
            Err(e) => quarantine(&path, &e).await?,
        }
    }

    Ok(records)
}

async fn quarantine(path: &Path, cause: &serde_json::Error) -> Result<()> {
    let target = path.with_extension(QUARANTINE_EXTENSION);
    fs::rename(path, &target)
        .await
        .map_err(|e| StorageError::Malformed(format!("{}: {cause} (quarantine failed: {e})", path.display())))?;

    warn!(
        "Skipping malformed record {}: {cause}; moved to {}",
        path.display(),
        target.display()
    );
    Ok(())
}
