use anyhow::{bail, Context, Result};
use inventory_collator_core::storage::models::CatalogEntry;
use inventory_collator_core::storage::Database;
use std::io;
use std::path::Path;

const HEADER: [&str; 12] = [
    "volume_key",
    "relative_path",
    "file_name",
    "extension",
    "size_bytes",
    "created_fs",
    "modified_fs",
    "header_valid",
    "content_hash",
    "scan_status",
    "first_seen_at",
    "last_seen_at",
];

/// Write every catalog entry of a volume, missing ones included, to a CSV file.
pub fn export_volume(db: &Database, volume_key: &str, output: &Path) -> Result<usize> {
    if db.get_volume(volume_key)?.is_none() {
        bail!("Volume {} is not in the catalog", volume_key);
    }
    let entries = db.list_files(volume_key, None)?;
    let file = std::fs::File::create(output)
        .with_context(|| format!("Unable to create {}", output.display()))?;
    write_entries(file, &entries)
}

pub fn write_entries<W: io::Write>(writer: W, entries: &[CatalogEntry]) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(HEADER)?;
    for entry in entries {
        let size_bytes = entry.size_bytes.to_string();
        csv_writer.write_record([
            entry.volume_key.as_str(),
            entry.relative_path.as_str(),
            entry.file_name.as_str(),
            entry.extension.as_deref().unwrap_or(""),
            size_bytes.as_str(),
            entry.created_fs.as_deref().unwrap_or(""),
            entry.modified_fs.as_deref().unwrap_or(""),
            if entry.header_valid { "true" } else { "false" },
            entry.content_hash.as_deref().unwrap_or(""),
            entry.scan_status.as_str(),
            entry.first_seen_at.as_str(),
            entry.last_seen_at.as_str(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_collator_core::storage::models::ScanStatus;

    fn entry(relative_path: &str, hash: Option<&str>, status: ScanStatus) -> CatalogEntry {
        CatalogEntry {
            id: 1,
            volume_key: "k-1".to_string(),
            relative_path: relative_path.to_string(),
            file_name: relative_path.rsplit('/').next().unwrap().to_string(),
            extension: Some("mp3".to_string()),
            size_bytes: 10,
            created_fs: None,
            modified_fs: Some("2024-03-01T10:00:00.000000000Z".to_string()),
            header_valid: hash.is_some(),
            content_hash: hash.map(|h| h.to_string()),
            scan_status: status,
            first_seen_at: "2024-03-01T10:00:00.000000Z".to_string(),
            last_seen_at: "2024-03-02T10:00:00.000000Z".to_string(),
        }
    }

    #[test]
    fn test_write_entries() {
        let mut out = Vec::new();
        let entries = vec![
            entry("Artist/01, Intro.mp3", Some("ab12"), ScanStatus::Active),
            entry("gone.mp3", None, ScanStatus::Missing),
        ];
        assert_eq!(write_entries(&mut out, &entries).unwrap(), 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("volume_key,relative_path,file_name"));
        // Fields containing the delimiter are quoted.
        assert!(lines[1].starts_with("k-1,\"Artist/01, Intro.mp3\",\"01, Intro.mp3\",mp3,10,,"));
        assert!(lines[1].contains(",true,ab12,active,"));
        assert!(lines[2].contains(",false,,missing,"));
    }

    #[test]
    fn test_export_unknown_volume_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let output = dir.path().join("out.csv");
        assert!(export_volume(&db, "nope", &output).is_err());
        assert!(!output.exists());
    }
}
