//! Drive-resident volume identity.
//!
//! A small JSON marker at the volume root carries a random key, so the same
//! physical volume resolves to the same catalog record no matter where it is
//! mounted. Markers are replaced by writing a temporary sibling and renaming
//! it over the old one.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MARKER_FILE_NAME: &str = ".__MUSIC_ARCHIVE_DRIVE_ID";
pub const MARKER_TEMP_FILE_NAME: &str = ".__MUSIC_ARCHIVE_DRIVE_ID.tmp";
pub const MARKER_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMarker {
    #[serde(alias = "drive_key")]
    pub volume_key: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub version: u32,
}

impl VolumeMarker {
    fn generate() -> Self {
        Self {
            volume_key: Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            version: MARKER_FORMAT_VERSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeIdentity {
    pub volume_key: String,
    /// True when this call generated and wrote a new marker.
    pub created: bool,
}

#[derive(Debug)]
pub enum MarkerState {
    Absent,
    Valid(VolumeMarker),
    /// Present but unreadable or unparseable.
    Corrupt(String),
}

pub fn marker_path(volume_root: &Path) -> PathBuf {
    volume_root.join(MARKER_FILE_NAME)
}

/// True for the marker and its temporary sibling, which are never cataloged.
pub fn is_marker_file_name(name: &str) -> bool {
    name == MARKER_FILE_NAME || name == MARKER_TEMP_FILE_NAME
}

pub fn read_marker(volume_root: &Path) -> MarkerState {
    let path = marker_path(volume_root);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return MarkerState::Absent,
        Err(e) => return MarkerState::Corrupt(e.to_string()),
    };
    parse_marker(&contents)
}

fn parse_marker(contents: &str) -> MarkerState {
    let trimmed = contents.trim();

    // First-generation markers hold nothing but the bare key.
    if let Ok(key) = Uuid::parse_str(trimmed) {
        return MarkerState::Valid(VolumeMarker {
            volume_key: key.to_string(),
            created_at: String::new(),
            version: 0,
        });
    }

    match serde_json::from_str::<VolumeMarker>(trimmed) {
        Ok(marker) if !marker.volume_key.trim().is_empty() => {
            if marker.version > MARKER_FORMAT_VERSION {
                debug!(
                    "Marker format version {} is newer than {}, reading key only",
                    marker.version, MARKER_FORMAT_VERSION
                );
            }
            MarkerState::Valid(marker)
        }
        Ok(_) => MarkerState::Corrupt("empty volume key".to_string()),
        Err(e) => MarkerState::Corrupt(e.to_string()),
    }
}

/// Write the marker to a temporary sibling, flush it to disk, then rename it
/// over the live marker.
pub fn write_marker(volume_root: &Path, marker: &VolumeMarker) -> Result<(), Error> {
    let temp_path = volume_root.join(MARKER_TEMP_FILE_NAME);
    let json = serde_json::to_string_pretty(marker)?;

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&temp_path, marker_path(volume_root)) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Reuse the key stored on the volume, or mint and persist a new one when
/// the marker is absent, corrupt, or `force_new` is set.
pub fn resolve_identity(volume_root: &Path, force_new: bool) -> Result<VolumeIdentity, Error> {
    if !force_new {
        match read_marker(volume_root) {
            MarkerState::Valid(marker) => {
                info!("Existing volume key detected: {}", marker.volume_key);
                return Ok(VolumeIdentity {
                    volume_key: marker.volume_key,
                    created: false,
                });
            }
            MarkerState::Absent => {
                info!("Volume key marker missing, creating a new one");
            }
            MarkerState::Corrupt(reason) => {
                warn!(
                    "Volume key marker at {} is unreadable ({}); discarding the previous identity",
                    marker_path(volume_root).display(),
                    reason
                );
            }
        }
    } else {
        info!("Forcing a new volume identity");
    }

    let marker = VolumeMarker::generate();
    write_marker(volume_root, &marker)?;
    info!("New volume key generated: {}", marker.volume_key);

    Ok(VolumeIdentity {
        volume_key: marker.volume_key,
        created: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_first_resolve_creates_marker() {
        let dir = tempdir().unwrap();
        let identity = resolve_identity(dir.path(), false).unwrap();
        assert!(identity.created);
        assert!(Uuid::parse_str(&identity.volume_key).is_ok());

        match read_marker(dir.path()) {
            MarkerState::Valid(marker) => {
                assert_eq!(marker.volume_key, identity.volume_key);
                assert_eq!(marker.version, MARKER_FORMAT_VERSION);
                assert!(!marker.created_at.is_empty());
            }
            other => panic!("Expected a valid marker, got {:?}", other),
        }
        assert!(!dir.path().join(MARKER_TEMP_FILE_NAME).exists());
    }

    #[test]
    fn test_resolve_is_stable() {
        let dir = tempdir().unwrap();
        let first = resolve_identity(dir.path(), false).unwrap();
        let second = resolve_identity(dir.path(), false).unwrap();
        assert_eq!(first.volume_key, second.volume_key);
        assert!(!second.created);
    }

    #[test]
    fn test_force_new_overwrites_marker() {
        let dir = tempdir().unwrap();
        let first = resolve_identity(dir.path(), false).unwrap();
        let forced = resolve_identity(dir.path(), true).unwrap();
        assert!(forced.created);
        assert_ne!(first.volume_key, forced.volume_key);

        let again = resolve_identity(dir.path(), false).unwrap();
        assert_eq!(again.volume_key, forced.volume_key);
    }

    #[test]
    fn test_corrupt_marker_is_replaced() {
        let dir = tempdir().unwrap();
        fs::write(marker_path(dir.path()), "{\"volume_key\": \"abc").unwrap();
        assert!(matches!(read_marker(dir.path()), MarkerState::Corrupt(_)));

        let identity = resolve_identity(dir.path(), false).unwrap();
        assert!(identity.created);
        assert!(matches!(read_marker(dir.path()), MarkerState::Valid(_)));
    }

    #[test]
    fn test_legacy_markers_are_accepted() {
        let dir = tempdir().unwrap();
        let key = "0b7e3c0e-7a5e-4a39-9a53-3f8d8f1d2c11";

        fs::write(marker_path(dir.path()), format!("{}\n", key)).unwrap();
        let identity = resolve_identity(dir.path(), false).unwrap();
        assert_eq!(identity.volume_key, key);
        assert!(!identity.created);

        fs::write(
            marker_path(dir.path()),
            format!(
                "{{\"drive_key\": \"{}\", \
                 \"created_at\": \"2024-01-01T00:00:00\", \"version\": 1}}",
                key
            ),
        )
        .unwrap();
        let identity = resolve_identity(dir.path(), false).unwrap();
        assert_eq!(identity.volume_key, key);
        assert!(!identity.created);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let state = parse_marker(
            "{\"volume_key\": \"k-1\", \"created_at\": \"x\", \
             \"version\": 3, \"label\": \"Archive\"}",
        );
        match state {
            MarkerState::Valid(marker) => {
                assert_eq!(marker.volume_key, "k-1");
                assert_eq!(marker.version, 3);
            }
            other => panic!("Expected a valid marker, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("not_mounted");
        assert!(resolve_identity(&missing, false).is_err());
    }

    #[test]
    fn test_marker_file_names() {
        assert!(is_marker_file_name(MARKER_FILE_NAME));
        assert!(is_marker_file_name(MARKER_TEMP_FILE_NAME));
        assert!(!is_marker_file_name("a.mp3"));
    }
}
