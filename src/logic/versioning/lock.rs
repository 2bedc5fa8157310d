//! Retrain Lock - advisory single-writer lock per document type
//!
//! The lock is a file created with `create_new` holding its owner and the
//! acquisition time. Dropping the guard removes it. A lock older than the
//! stale limit is assumed abandoned and taken over.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::error::{RetrainError, RetrainResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// `pid@hostname`
    pub owner: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn current() -> Self {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            owner: format!("{}@{}", std::process::id(), host),
            acquired_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct RetrainLock {
    path: PathBuf,
    info: LockInfo,
}

impl RetrainLock {
    pub fn acquire(path: &Path, document_type: &str, stale_after: Duration) -> RetrainResult<Self> {
        let info = LockInfo::current();
        match try_create(path, &info) {
            Ok(()) => return Ok(Self::held(path, info)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(RetrainError::persistence(path, e)),
        }

        let existing = read_info(path);
        let age = match &existing {
            Some(i) => Some(
                Utc::now()
                    .signed_duration_since(i.acquired_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO),
            ),
            // Half-written or foreign file: fall back to its mtime
            None => fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.elapsed().ok()),
        };
        let owner = existing
            .as_ref()
            .map(|i| i.owner.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let stale = age.map_or(true, |a| a >= stale_after);
        if !stale {
            return Err(RetrainError::LockHeld {
                document_type: document_type.to_string(),
                owner,
            });
        }

        log::warn!(
            "Taking over stale retrain lock for {} held by {} ({})",
            document_type,
            owner,
            path.display()
        );
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(RetrainError::persistence(path, e)),
        }
        match try_create(path, &info) {
            Ok(()) => Ok(Self::held(path, info)),
            // Someone else won the takeover race
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(RetrainError::LockHeld {
                document_type: document_type.to_string(),
                owner: read_info(path)
                    .map(|i| i.owner)
                    .unwrap_or_else(|| "unknown".to_string()),
            }),
            Err(e) => Err(RetrainError::persistence(path, e)),
        }
    }

    fn held(path: &Path, info: LockInfo) -> Self {
        log::debug!("Acquired retrain lock {} as {}", path.display(), info.owner);
        Self {
            path: path.to_path_buf(),
            info,
        }
    }

    pub fn owner(&self) -> &str {
        &self.info.owner
    }
}

impl Drop for RetrainLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                log::warn!("Failed to release retrain lock {}: {}", self.path.display(), e);
            }
        }
    }
}

fn try_create(path: &Path, info: &LockInfo) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let json = serde_json::to_vec(info)?;
    file.write_all(&json)?;
    file.sync_all()
}

fn read_info(path: &Path) -> Option<LockInfo> {
    fs::read(path)
        .ok()
        .and_then(|data| serde_json::from_slice(&data).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_second_acquire_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".retrain.lock");

        let first = RetrainLock::acquire(&path, "invoice", HOUR).unwrap();
        let second = RetrainLock::acquire(&path, "invoice", HOUR);
        assert!(matches!(second, Err(RetrainError::LockHeld { .. })));

        drop(first);
        assert!(!path.exists());
        assert!(RetrainLock::acquire(&path, "invoice", HOUR).is_ok());
    }

    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".retrain.lock");
        let old = LockInfo {
            owner: "1@elsewhere".to_string(),
            acquired_at: Utc::now() - chrono::Duration::hours(5),
        };
        fs::write(&path, serde_json::to_vec(&old).unwrap()).unwrap();

        let lock = RetrainLock::acquire(&path, "invoice", HOUR).unwrap();
        assert_ne!(lock.owner(), "1@elsewhere");
    }

    #[test]
    fn test_unreadable_lock_uses_file_age() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".retrain.lock");
        fs::write(&path, b"not json").unwrap();

        assert!(RetrainLock::acquire(&path, "invoice", HOUR).is_err());
        assert!(RetrainLock::acquire(&path, "invoice", Duration::ZERO).is_ok());
    }
}
