use crate::metadata::AudioMetadata;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::fmt;

/// Presence of a catalog entry as of the latest scan of its volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Active,
    Missing,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Active => "active",
            ScanStatus::Missing => "missing",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for ScanStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ScanStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "active" => Ok(ScanStatus::Active),
            "missing" => Ok(ScanStatus::Missing),
            other => Err(FromSqlError::Other(
                format!("unknown scan status '{}'", other).into(),
            )),
        }
    }
}

/// Outcome recorded for a scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Interrupted => "interrupted",
        }
    }
}

impl ToSql for RunStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RunStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "interrupted" => Ok(RunStatus::Interrupted),
            other => Err(FromSqlError::Other(
                format!("unknown run status '{}'", other).into(),
            )),
        }
    }
}

/// One physical storage volume.
#[derive(Debug, Clone)]
pub struct Volume {
    pub id: i64,
    pub volume_key: String,
    pub label: Option<String>,
    /// Mount path of the latest scan. Informational, never identity.
    pub last_root_path: Option<String>,
    pub total_bytes: Option<i64>,
    pub free_bytes: Option<i64>,
    pub status: String,
    pub created_at: String,
    pub last_seen_at: String,
}

/// Volume fields refreshed on every scan.
#[derive(Debug, Clone, Default)]
pub struct VolumeRegistration {
    pub volume_key: String,
    pub label: Option<String>,
    pub root_path: String,
    pub total_bytes: Option<i64>,
    pub free_bytes: Option<i64>,
}

/// One relative path observed under a volume.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: i64,
    pub volume_key: String,
    pub relative_path: String,
    pub file_name: String,
    pub extension: Option<String>,
    pub size_bytes: i64,
    pub created_fs: Option<String>,
    pub modified_fs: Option<String>,
    pub header_valid: bool,
    pub content_hash: Option<String>,
    pub scan_status: ScanStatus,
    pub first_seen_at: String,
    pub last_seen_at: String,
}

/// What to do with the metadata row of an upserted file.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataUpdate {
    /// Leave the stored row as it is.
    Keep,
    Replace(AudioMetadata),
    Clear,
}

/// A file observation ready to be upserted.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub volume_key: String,
    pub relative_path: String,
    pub file_name: String,
    pub extension: Option<String>,
    pub size_bytes: i64,
    pub created_fs: Option<String>,
    pub modified_fs: Option<String>,
    pub header_valid: bool,
    pub content_hash: Option<String>,
    pub metadata: MetadataUpdate,
}

/// Stored state of a path consulted before reprocessing it.
#[derive(Debug, Clone)]
pub struct PriorFileState {
    pub id: i64,
    pub size_bytes: i64,
    pub modified_fs: Option<String>,
    pub header_valid: bool,
    pub content_hash: Option<String>,
    pub has_metadata: bool,
}

#[derive(Debug, Clone)]
pub struct ScanRun {
    pub id: i64,
    pub volume_key: String,
    pub root_path: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: RunStatus,
    pub files_seen: i64,
    pub audio_files: i64,
    pub bytes_scanned: i64,
    pub missing_files: i64,
}

/// Counters written to a scan run when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub files_seen: u64,
    pub audio_files: u64,
    pub bytes_scanned: u64,
    pub missing_files: u64,
}

/// Entry counts per status for one volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub active: i64,
    pub missing: i64,
}
