//! Version Store - per-document-type files on disk
//!
//! Layout under `{storage_root}/{document_type}/`:
//! - `performance_history.json` - ordered `ModelVersion` records
//! - `active_version` - pointer holding one version id
//! - `artifacts/{document_type}_{role}_{version_id}.json`
//!
//! Every write goes to a temp file in the same directory, is synced, then
//! renamed over the target.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::lock::RetrainLock;
use super::types::{ArtifactEnvelope, ArtifactRole, ModelVersion};
use crate::constants::{
    ACTIVE_POINTER_FILE_NAME, ARTIFACT_DIR_NAME, ARTIFACT_FORMAT_VERSION, AUDIT_FILE_NAME,
    HISTORY_FILE_NAME, LOCK_FILE_NAME,
};
use crate::logic::error::{RetrainError, RetrainResult};
use crate::logic::features::validate_document_type;

#[derive(Debug, Clone)]
pub struct VersionStore {
    document_type: String,
    dir: PathBuf,
}

impl VersionStore {
    /// Open (creating if needed) the store of one document type
    pub fn open(storage_root: &Path, document_type: &str) -> RetrainResult<Self> {
        validate_document_type(document_type)?;
        let dir = storage_root.join(document_type);
        fs::create_dir_all(dir.join(ARTIFACT_DIR_NAME))
            .map_err(|e| RetrainError::persistence(&dir, e))?;

        let store = Self {
            document_type: document_type.to_string(),
            dir,
        };
        store.reconcile_pointer()?;
        Ok(store)
    }

    /// Take the single-writer lock of a document type. Held for the whole of
    /// any history or pointer rewrite, including `open`'s pointer repair.
    pub fn lock(storage_root: &Path, document_type: &str, stale_after: Duration) -> RetrainResult<RetrainLock> {
        validate_document_type(document_type)?;
        let dir = storage_root.join(document_type);
        fs::create_dir_all(&dir).map_err(|e| RetrainError::persistence(&dir, e))?;
        RetrainLock::acquire(&dir.join(LOCK_FILE_NAME), document_type, stale_after)
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE_NAME)
    }

    pub fn pointer_path(&self) -> PathBuf {
        self.dir.join(ACTIVE_POINTER_FILE_NAME)
    }

    pub fn audit_path(&self) -> PathBuf {
        self.dir.join(AUDIT_FILE_NAME)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE_NAME)
    }

    pub fn artifact_path(&self, role: ArtifactRole, version_id: &str) -> PathBuf {
        self.dir.join(ARTIFACT_DIR_NAME).join(format!(
            "{}_{}_{}.json",
            self.document_type,
            role.as_str(),
            version_id
        ))
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    /// History in file order; a missing file is an empty history
    pub fn load_history(&self) -> RetrainResult<Vec<ModelVersion>> {
        let path = self.history_path();
        let data = match fs::read(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RetrainError::persistence(&path, e)),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn save_history(&self, history: &[ModelVersion]) -> RetrainResult<()> {
        let json = serde_json::to_vec_pretty(history)?;
        atomic_write(&self.history_path(), &json)
    }

    // ========================================================================
    // ACTIVE POINTER
    // ========================================================================

    pub fn read_pointer(&self) -> RetrainResult<Option<String>> {
        let path = self.pointer_path();
        match fs::read_to_string(&path) {
            Ok(s) => {
                let id = s.trim();
                Ok(if id.is_empty() { None } else { Some(id.to_string()) })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RetrainError::persistence(&path, e)),
        }
    }

    pub fn write_pointer(&self, version_id: &str) -> RetrainResult<()> {
        atomic_write(&self.pointer_path(), format!("{}\n", version_id).as_bytes())
    }

    pub fn clear_pointer(&self) -> RetrainResult<()> {
        let path = self.pointer_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RetrainError::persistence(&path, e)),
        }
    }

    /// Make the pointer agree with the history's active entry
    fn reconcile_pointer(&self) -> RetrainResult<()> {
        let history = self.load_history()?;
        let active = history.iter().find(|v| v.is_active).map(|v| v.version_id.as_str());
        let pointer = self.read_pointer()?;

        if pointer.as_deref() == active {
            return Ok(());
        }
        log::warn!(
            "Active pointer for {} is {:?} but history says {:?}; repairing pointer",
            self.document_type,
            pointer,
            active
        );
        match active {
            Some(id) => self.write_pointer(id),
            None => self.clear_pointer(),
        }
    }

    // ========================================================================
    // ARTIFACTS
    // ========================================================================

    pub fn write_artifact<T: Serialize>(
        &self,
        role: ArtifactRole,
        version_id: &str,
        schema_hash: u32,
        value: &T,
    ) -> RetrainResult<PathBuf> {
        let payload = serde_json::to_value(value)?;
        let envelope = ArtifactEnvelope {
            format_version: ARTIFACT_FORMAT_VERSION,
            document_type: self.document_type.clone(),
            role,
            version_id: version_id.to_string(),
            schema_hash,
            checksum: payload_checksum(&payload)?,
            payload,
        };
        let path = self.artifact_path(role, version_id);
        atomic_write(&path, &serde_json::to_vec(&envelope)?)?;
        Ok(path)
    }

    /// Load one artifact, verifying envelope fields and checksum
    pub fn read_artifact<T: DeserializeOwned>(
        &self,
        role: ArtifactRole,
        version_id: &str,
        schema_hash: u32,
    ) -> RetrainResult<T> {
        let path = self.artifact_path(role, version_id);
        let integrity = |reason: String| RetrainError::ArtifactIntegrity {
            path: path.clone(),
            reason,
        };

        let data = fs::read(&path).map_err(|e| integrity(e.to_string()))?;
        let envelope: ArtifactEnvelope =
            serde_json::from_slice(&data).map_err(|e| integrity(format!("unreadable envelope: {}", e)))?;

        if envelope.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(integrity(format!(
                "format version {} (expected {})",
                envelope.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if envelope.document_type != self.document_type
            || envelope.role != role
            || envelope.version_id != version_id
        {
            return Err(integrity(format!(
                "envelope names {}/{}/{}",
                envelope.document_type,
                envelope.role.as_str(),
                envelope.version_id
            )));
        }
        if envelope.schema_hash != schema_hash {
            return Err(integrity(format!(
                "schema hash {:08x} (expected {:08x})",
                envelope.schema_hash, schema_hash
            )));
        }
        let actual = payload_checksum(&envelope.payload)?;
        if actual != envelope.checksum {
            return Err(integrity(format!(
                "checksum mismatch: stored {}, computed {}",
                envelope.checksum, actual
            )));
        }

        serde_json::from_value(envelope.payload).map_err(|e| integrity(format!("bad payload: {}", e)))
    }

    pub fn has_artifacts(&self, version_id: &str) -> bool {
        ArtifactRole::ALL
            .iter()
            .all(|role| self.artifact_path(*role, version_id).is_file())
    }

    /// Remove all artifact files of a version; missing files are fine.
    /// Every role is attempted; the first failure is returned.
    pub fn delete_artifacts(&self, version_id: &str) -> RetrainResult<()> {
        let mut first_error = None;
        for role in ArtifactRole::ALL {
            let path = self.artifact_path(role, version_id);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    first_error.get_or_insert(RetrainError::persistence(&path, e));
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

fn payload_checksum(payload: &serde_json::Value) -> RetrainResult<String> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Write to `.{name}.tmp`, fsync, rename over `path`
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> RetrainResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    result.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        RetrainError::persistence(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_bad_document_type() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VersionStore::open(dir.path(), "../escape").is_err());
        assert!(VersionStore::open(dir.path(), "Invoice").is_err());
    }

    #[test]
    fn test_pointer_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::open(dir.path(), "invoice").unwrap();
        assert_eq!(store.read_pointer().unwrap(), None);

        store.write_pointer("20260101T000000.000000Z").unwrap();
        assert_eq!(
            store.read_pointer().unwrap().as_deref(),
            Some("20260101T000000.000000Z")
        );

        store.clear_pointer().unwrap();
        assert_eq!(store.read_pointer().unwrap(), None);
    }

    #[test]
    fn test_open_clears_pointer_without_active_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::open(dir.path(), "invoice").unwrap();
        store.write_pointer("stale").unwrap();

        let reopened = VersionStore::open(dir.path(), "invoice").unwrap();
        assert_eq!(reopened.read_pointer().unwrap(), None);
    }

    #[test]
    fn test_artifact_name_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::open(dir.path(), "invoice").unwrap();
        let path = store.artifact_path(ArtifactRole::Scaler, "v1");
        assert!(path.ends_with("invoice/artifacts/invoice_scaler_v1.json"));
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("data.json");
        atomic_write(&target, b"{}").unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["data.json".to_string()]);
    }
}
