//! Retrain Audit Log - what happened to each document type's models
//!
//! Log format: JSON Lines (.jsonl)
//! Location: {storage_root}/{document_type}/retrain_audit.jsonl
//!
//! Audit writes never fail the operation being audited; errors are logged.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::logic::error::{RetrainError, RetrainResult};

// ============================================================================
// CONSTANTS
// ============================================================================

const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024; // Rotate at 5 MiB

// ============================================================================
// ENTRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RetrainStarted,
    RetrainSkipped,
    QualityRejected,
    TrainingFailed,
    VersionRecorded,
    RegressionRejected,
    ArtifactsPersisted,
    PersistenceFailed,
    VersionActivated,
    VersionsPruned,
    RolledBack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub action: AuditAction,
    pub document_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditLogEntry {
    pub fn new(action: AuditAction, document_type: &str) -> Self {
        Self {
            timestamp: Utc::now().timestamp(),
            action,
            document_type: document_type.to_string(),
            run_id: None,
            version_id: None,
            details: None,
        }
    }

    pub fn with_run(mut self, run_id: Option<&str>) -> Self {
        self.run_id = run_id.map(|s| s.to_string());
        self
    }

    pub fn with_version(mut self, version_id: &str) -> Self {
        self.version_id = Some(version_id.to_string());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

// ============================================================================
// LOG
// ============================================================================

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry
    pub fn log(&self, entry: AuditLogEntry) {
        if let Err(e) = self.write_to_disk(&entry) {
            log::error!("Failed to write audit log {}: {}", self.path.display(), e);
        }
    }

    /// All readable entries, oldest first; unparseable lines are skipped
    pub fn read_all(&self) -> RetrainResult<Vec<AuditLogEntry>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RetrainError::Io(e)),
        };
        let entries = BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str::<AuditLogEntry>(&line).ok())
            .collect();
        Ok(entries)
    }

    /// Last `limit` entries
    pub fn recent(&self, limit: usize) -> RetrainResult<Vec<AuditLogEntry>> {
        let mut all = self.read_all()?;
        let start = all.len().saturating_sub(limit);
        Ok(all.split_off(start))
    }

    fn write_to_disk(&self, entry: &AuditLogEntry) -> std::io::Result<()> {
        self.rotate_if_needed()?;

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        let json = serde_json::to_string(entry)?;
        writeln!(writer, "{}", json)?;
        writer.flush()
    }

    fn rotate_if_needed(&self) -> std::io::Result<()> {
        let size = match fs::metadata(&self.path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        if size < MAX_LOG_BYTES {
            return Ok(());
        }
        let rotated = self.path.with_extension("jsonl.old");
        fs::rename(&self.path, &rotated)?;
        log::info!("Rotated audit log to {}", rotated.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("retrain_audit.jsonl"));

        audit.log(AuditLogEntry::new(AuditAction::RetrainStarted, "invoice").with_run(Some("run-1")));
        audit.log(
            AuditLogEntry::new(AuditAction::VersionActivated, "invoice")
                .with_run(Some("run-1"))
                .with_version("v1")
                .with_details("first version"),
        );

        let entries = audit.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, AuditAction::VersionActivated);
        assert_eq!(entries[1].version_id.as_deref(), Some("v1"));

        let recent = audit.recent(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].action, AuditAction::VersionActivated);
    }

    #[test]
    fn test_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("none.jsonl"));
        assert!(audit.read_all().unwrap().is_empty());
    }
}
