pub mod models;
pub mod queries;
pub mod sqlite;

pub use sqlite::Database;

use crate::error::Error;
use chrono::{SecondsFormat, Utc};
use models::{FileRecord, PriorFileState, RunCounters, RunStatus, VolumeRegistration};

/// Fixed-width UTC timestamp, so stored values order lexically.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Persistence operations the scan engine relies on.
///
/// A scan calls `mark_active_as_missing` once before any `upsert_files`;
/// every upsert forces its entries back to `active`. Nothing is ever deleted.
pub trait CatalogStore {
    /// Insert or refresh a volume. Returns true when the volume is new.
    fn register_volume(&self, volume: &VolumeRegistration, seen_at: &str) -> Result<bool, Error>;

    fn mark_active_as_missing(&self, volume_key: &str) -> Result<usize, Error>;

    fn prior_file_state(
        &self,
        volume_key: &str,
        relative_path: &str,
    ) -> Result<Option<PriorFileState>, Error>;

    /// Entries of the volume currently flagged missing.
    fn count_missing(&self, volume_key: &str) -> Result<usize, Error>;

    /// Upsert by (volume_key, relative_path) in one transaction.
    fn upsert_files(&self, records: &[FileRecord], seen_at: &str) -> Result<usize, Error>;

    fn begin_scan_run(&self, volume_key: &str, root_path: &str) -> Result<i64, Error>;

    fn finish_scan_run(
        &self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
    ) -> Result<(), Error>;
}

impl CatalogStore for Database {
    fn register_volume(&self, volume: &VolumeRegistration, seen_at: &str) -> Result<bool, Error> {
        Ok(self.upsert_volume(volume, seen_at)?)
    }

    fn mark_active_as_missing(&self, volume_key: &str) -> Result<usize, Error> {
        Ok(self.mark_volume_files_missing(volume_key)?)
    }

    fn prior_file_state(
        &self,
        volume_key: &str,
        relative_path: &str,
    ) -> Result<Option<PriorFileState>, Error> {
        Ok(self.get_prior_file_state(volume_key, relative_path)?)
    }

    fn count_missing(&self, volume_key: &str) -> Result<usize, Error> {
        Ok(self.count_files_by_status(volume_key)?.missing as usize)
    }

    fn upsert_files(&self, records: &[FileRecord], seen_at: &str) -> Result<usize, Error> {
        Ok(self.upsert_file_records(records, seen_at)?)
    }

    fn begin_scan_run(&self, volume_key: &str, root_path: &str) -> Result<i64, Error> {
        Ok(self.create_scan_run(volume_key, root_path)?)
    }

    fn finish_scan_run(
        &self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
    ) -> Result<(), Error> {
        Ok(self.complete_scan_run(run_id, status, counters)?)
    }
}
