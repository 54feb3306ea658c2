use super::models::*;
use super::sqlite::Database;
use super::timestamp_now;
use crate::metadata::AudioMetadata;
use crate::scanner::path::path_components;
use rusqlite::{params, Result, Row};
use tracing::debug;

const FILE_COLUMNS: &str = "id, volume_key, relative_path, file_name, extension, size_bytes, \
     created_fs, modified_fs, header_valid, content_hash, scan_status, first_seen_at, last_seen_at";

fn map_catalog_entry(row: &Row<'_>) -> Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(0)?,
        volume_key: row.get(1)?,
        relative_path: row.get(2)?,
        file_name: row.get(3)?,
        extension: row.get(4)?,
        size_bytes: row.get(5)?,
        created_fs: row.get(6)?,
        modified_fs: row.get(7)?,
        header_valid: row.get(8)?,
        content_hash: row.get(9)?,
        scan_status: row.get(10)?,
        first_seen_at: row.get(11)?,
        last_seen_at: row.get(12)?,
    })
}

fn map_volume(row: &Row<'_>) -> Result<Volume> {
    Ok(Volume {
        id: row.get(0)?,
        volume_key: row.get(1)?,
        label: row.get(2)?,
        last_root_path: row.get(3)?,
        total_bytes: row.get(4)?,
        free_bytes: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        last_seen_at: row.get(8)?,
    })
}

impl Database {
    // ── Volumes ──────────────────────────────────────────────────

    /// Insert the volume or refresh its informational fields. Returns true
    /// when no record existed for the key.
    pub fn upsert_volume(&self, volume: &VolumeRegistration, seen_at: &str) -> Result<bool> {
        let is_new = self.get_volume(&volume.volume_key)?.is_none();
        self.connection().execute(
            "INSERT INTO volumes \
             (volume_key, label, last_root_path, total_bytes, free_bytes, status, created_at, last_seen_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?6) \
             ON CONFLICT(volume_key) DO UPDATE SET \
                 label = COALESCE(excluded.label, volumes.label), \
                 last_root_path = excluded.last_root_path, \
                 total_bytes = COALESCE(excluded.total_bytes, volumes.total_bytes), \
                 free_bytes = COALESCE(excluded.free_bytes, volumes.free_bytes), \
                 last_seen_at = excluded.last_seen_at",
            params![
                volume.volume_key,
                volume.label,
                volume.root_path,
                volume.total_bytes,
                volume.free_bytes,
                seen_at,
            ],
        )?;
        debug!(volume_key = %volume.volume_key, is_new, "Volume registered");
        Ok(is_new)
    }

    pub fn get_volume(&self, volume_key: &str) -> Result<Option<Volume>> {
        match self.connection().query_row(
            "SELECT id, volume_key, label, last_root_path, total_bytes, free_bytes, status, \
                    created_at, last_seen_at \
             FROM volumes WHERE volume_key = ?1",
            params![volume_key],
            map_volume,
        ) {
            Ok(volume) => Ok(Some(volume)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn list_volumes(&self) -> Result<Vec<Volume>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, volume_key, label, last_root_path, total_bytes, free_bytes, status, \
                    created_at, last_seen_at \
             FROM volumes ORDER BY last_seen_at DESC",
        )?;
        let volumes = stmt
            .query_map([], map_volume)?
            .collect::<Result<Vec<_>>>()?;
        Ok(volumes)
    }

    // ── Reconciliation ───────────────────────────────────────────

    /// Flag every active entry of the volume as missing. Entries seen again
    /// during the walk are flipped back by `upsert_file_records`.
    pub fn mark_volume_files_missing(&self, volume_key: &str) -> Result<usize> {
        let count = self.connection().execute(
            "UPDATE files SET scan_status = 'missing' \
             WHERE volume_key = ?1 AND scan_status = 'active'",
            params![volume_key],
        )?;
        debug!("Marked {} entries missing for volume {}", count, volume_key);
        Ok(count)
    }

    pub fn get_prior_file_state(
        &self,
        volume_key: &str,
        relative_path: &str,
    ) -> Result<Option<PriorFileState>> {
        match self.connection().query_row(
            "SELECT f.id, f.size_bytes, f.modified_fs, f.header_valid, f.content_hash, \
                    EXISTS(SELECT 1 FROM file_audio_metadata m WHERE m.file_id = f.id) \
             FROM files f WHERE f.volume_key = ?1 AND f.relative_path = ?2",
            params![volume_key, relative_path],
            |row| {
                Ok(PriorFileState {
                    id: row.get(0)?,
                    size_bytes: row.get(1)?,
                    modified_fs: row.get(2)?,
                    header_valid: row.get(3)?,
                    content_hash: row.get(4)?,
                    has_metadata: row.get(5)?,
                })
            },
        ) {
            Ok(state) => Ok(Some(state)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Upsert each record by its natural key, force it `active`, rebuild its
    /// path components and apply its metadata update.
    pub fn upsert_file_records(&self, records: &[FileRecord], seen_at: &str) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut upsert_stmt = tx.prepare_cached(
                "INSERT INTO files \
                 (volume_key, relative_path, file_name, extension, size_bytes, created_fs, \
                  modified_fs, header_valid, content_hash, scan_status, first_seen_at, last_seen_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'active', ?10, ?10) \
                 ON CONFLICT(volume_key, relative_path) DO UPDATE SET \
                     file_name = excluded.file_name, \
                     extension = excluded.extension, \
                     size_bytes = excluded.size_bytes, \
                     created_fs = excluded.created_fs, \
                     modified_fs = excluded.modified_fs, \
                     header_valid = excluded.header_valid, \
                     content_hash = excluded.content_hash, \
                     scan_status = 'active', \
                     last_seen_at = excluded.last_seen_at \
                 RETURNING id",
            )?;
            let mut clear_components_stmt =
                tx.prepare_cached("DELETE FROM file_path_components WHERE file_id = ?1")?;
            let mut component_stmt = tx.prepare_cached(
                "INSERT INTO file_path_components (file_id, component_order, component_name) \
                 VALUES (?1, ?2, ?3)",
            )?;
            let mut metadata_stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO file_audio_metadata \
                 (file_id, duration_seconds, bitrate, sample_rate, channels, artist, album, title, year) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            let mut clear_metadata_stmt =
                tx.prepare_cached("DELETE FROM file_audio_metadata WHERE file_id = ?1")?;

            for record in records {
                let file_id: i64 = upsert_stmt.query_row(
                    params![
                        record.volume_key,
                        record.relative_path,
                        record.file_name,
                        record.extension,
                        record.size_bytes,
                        record.created_fs,
                        record.modified_fs,
                        record.header_valid,
                        record.content_hash,
                        seen_at,
                    ],
                    |row| row.get(0),
                )?;

                clear_components_stmt.execute(params![file_id])?;
                for (order, name) in path_components(&record.relative_path).iter().enumerate() {
                    component_stmt.execute(params![file_id, order as i64, name])?;
                }

                match &record.metadata {
                    MetadataUpdate::Keep => {}
                    MetadataUpdate::Replace(metadata) => {
                        metadata_stmt.execute(params![
                            file_id,
                            metadata.duration_seconds,
                            metadata.bitrate,
                            metadata.sample_rate,
                            metadata.channels,
                            metadata.artist,
                            metadata.album,
                            metadata.title,
                            metadata.year,
                        ])?;
                    }
                    MetadataUpdate::Clear => {
                        clear_metadata_stmt.execute(params![file_id])?;
                    }
                }
                count += 1;
            }
        }
        tx.commit()?;
        debug!("Upserted {} catalog entries", count);
        Ok(count)
    }

    // ── Catalog Queries ──────────────────────────────────────────

    pub fn get_file(&self, volume_key: &str, relative_path: &str) -> Result<Option<CatalogEntry>> {
        match self.connection().query_row(
            &format!(
                "SELECT {} FROM files WHERE volume_key = ?1 AND relative_path = ?2",
                FILE_COLUMNS
            ),
            params![volume_key, relative_path],
            map_catalog_entry,
        ) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Entries of a volume ordered by path, optionally restricted to one status.
    pub fn list_files(
        &self,
        volume_key: &str,
        status: Option<ScanStatus>,
    ) -> Result<Vec<CatalogEntry>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM files \
             WHERE volume_key = ?1 AND (?2 IS NULL OR scan_status = ?2) \
             ORDER BY relative_path",
            FILE_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![volume_key, status], map_catalog_entry)?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn count_files_by_status(&self, volume_key: &str) -> Result<StatusCounts> {
        self.connection().query_row(
            "SELECT \
                 COALESCE(SUM(CASE WHEN scan_status = 'active' THEN 1 ELSE 0 END), 0), \
                 COALESCE(SUM(CASE WHEN scan_status = 'missing' THEN 1 ELSE 0 END), 0) \
             FROM files WHERE volume_key = ?1",
            params![volume_key],
            |row| {
                Ok(StatusCounts {
                    active: row.get(0)?,
                    missing: row.get(1)?,
                })
            },
        )
    }

    pub fn get_path_components(&self, file_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.connection().prepare(
            "SELECT component_name FROM file_path_components \
             WHERE file_id = ?1 ORDER BY component_order",
        )?;
        let components = stmt
            .query_map(params![file_id], |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;
        Ok(components)
    }

    pub fn get_audio_metadata(&self, file_id: i64) -> Result<Option<AudioMetadata>> {
        match self.connection().query_row(
            "SELECT duration_seconds, bitrate, sample_rate, channels, artist, album, title, year \
             FROM file_audio_metadata WHERE file_id = ?1",
            params![file_id],
            |row| {
                Ok(AudioMetadata {
                    duration_seconds: row.get(0)?,
                    bitrate: row.get(1)?,
                    sample_rate: row.get(2)?,
                    channels: row.get(3)?,
                    artist: row.get(4)?,
                    album: row.get(5)?,
                    title: row.get(6)?,
                    year: row.get(7)?,
                })
            },
        ) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ── Scan Runs ────────────────────────────────────────────────

    pub fn create_scan_run(&self, volume_key: &str, root_path: &str) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO scan_runs (volume_key, root_path, started_at, status) \
             VALUES (?1, ?2, ?3, ?4)",
            params![volume_key, root_path, timestamp_now(), RunStatus::Running],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn complete_scan_run(
        &self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
    ) -> Result<()> {
        self.connection().execute(
            "UPDATE scan_runs SET completed_at = ?1, status = ?2, files_seen = ?3, \
             audio_files = ?4, bytes_scanned = ?5, missing_files = ?6 WHERE id = ?7",
            params![
                timestamp_now(),
                status,
                counters.files_seen as i64,
                counters.audio_files as i64,
                counters.bytes_scanned as i64,
                counters.missing_files as i64,
                run_id,
            ],
        )?;
        Ok(())
    }

    /// Scan runs of a volume, newest first.
    pub fn list_scan_runs(&self, volume_key: &str) -> Result<Vec<ScanRun>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, volume_key, root_path, started_at, completed_at, status, files_seen, \
                    audio_files, bytes_scanned, missing_files \
             FROM scan_runs WHERE volume_key = ?1 ORDER BY id DESC",
        )?;
        let runs = stmt
            .query_map(params![volume_key], |row| {
                Ok(ScanRun {
                    id: row.get(0)?,
                    volume_key: row.get(1)?,
                    root_path: row.get(2)?,
                    started_at: row.get(3)?,
                    completed_at: row.get(4)?,
                    status: row.get(5)?,
                    files_seen: row.get(6)?,
                    audio_files: row.get(7)?,
                    bytes_scanned: row.get(8)?,
                    missing_files: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(runs)
    }
}
