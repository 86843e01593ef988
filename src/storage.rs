// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Durable token storage.
//!
//! The token is the only piece of session state that survives a restart. It
//! lives under the single key `token` in a small JSON file; everything else
//! (deadlines, countdown) is rebuilt on every start.
//!
//! Writes go to a temp file that is renamed over the real one while an
//! exclusive lock is held on a sibling `.lock` file, so two processes never
//! interleave a half-written token.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default timeout for acquiring the lock file.
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry interval while another process holds the lock.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("token store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token store at {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("timed out after {0:?} waiting for the token store lock")]
    LockTimeout(Duration),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where the session token is persisted between runs.
pub trait TokenStore: Send {
    fn load(&self) -> Result<Option<String>, StorageError>;
    fn save(&self, token: &str) -> Result<(), StorageError>;
    /// Remove the token. Removing an absent token is not an error.
    fn clear(&self) -> Result<(), StorageError>;
}

/// In-process store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.slot().clone())
    }

    fn save(&self, token: &str) -> Result<(), StorageError> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.slot() = None;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default)]
    token: Option<String>,
}

/// JSON file store, by default `~/.clinic/session.json`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn open_lock_file(&self) -> Result<File, StorageError> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StorageError::io(&lock_path, e))
    }

    /// Spin on a non-blocking lock attempt until it succeeds or times out.
    fn acquire(&self, file: &File, exclusive: bool) -> Result<(), StorageError> {
        let start = Instant::now();
        loop {
            let attempt = if exclusive {
                file.try_lock_exclusive()
            } else {
                FileExt::try_lock_shared(file)
            };
            match attempt {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= self.lock_timeout {
                        return Err(StorageError::LockTimeout(self.lock_timeout));
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(StorageError::io(&self.lock_path(), e)),
            }
        }
    }

    fn write(&self, stored: &StoredSession) -> Result<(), StorageError> {
        let lock_file = self.open_lock_file()?;
        self.acquire(&lock_file, true)?;

        let content = serde_json::to_string_pretty(stored).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let temp_path = self.path.with_extension("tmp");
        {
            let mut temp = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| StorageError::io(&temp_path, e))?;
            temp.write_all(content.as_bytes())
                .map_err(|e| StorageError::io(&temp_path, e))?;
            temp.sync_all().map_err(|e| StorageError::io(&temp_path, e))?;
        }
        restrict_permissions(&temp_path);

        fs::rename(&temp_path, &self.path).map_err(|e| StorageError::io(&self.path, e))?;
        // lock released when lock_file drops
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("TOKEN_STORE | could not restrict permissions on {:?}: {}", path, e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let lock_file = self.open_lock_file()?;
        self.acquire(&lock_file, false)?;

        let content = fs::read_to_string(&self.path).map_err(|e| StorageError::io(&self.path, e))?;
        let stored: StoredSession = serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        Ok(stored.token.filter(|t| !t.trim().is_empty()))
    }

    fn save(&self, token: &str) -> Result<(), StorageError> {
        self.write(&StoredSession {
            token: Some(token.to_string()),
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        if !self.path.exists() {
            return Ok(());
        }
        self.write(&StoredSession::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save("abc").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");

        FileTokenStore::new(&path).save("tok-123").unwrap();
        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.load().unwrap().as_deref(), Some("tok-123"));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["token"], "tok-123");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_file_store_overwrite_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("session.json"));

        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();

        store.save("first").unwrap();
        store.save("second").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("second"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();
        let err = FileTokenStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[test]
    fn test_file_store_lock_timeout() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("session.json"))
            .with_lock_timeout(Duration::from_millis(100));

        let holder = store.open_lock_file().unwrap();
        holder.lock_exclusive().unwrap();

        // fs2 locks are per open file description, so a second handle contends.
        let err = store.save("tok").unwrap_err();
        assert!(matches!(err, StorageError::LockTimeout(_)));

        holder.unlock().unwrap();
        store.save("tok").unwrap();
    }
}
