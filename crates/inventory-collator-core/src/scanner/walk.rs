use super::path::relative_path;
use crate::identity::is_marker_file_name;
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use walkdir::{DirEntry, WalkDir};

/// A regular file found under a volume root.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub relative_path: String,
}

/// One regular file reached by the walk.
#[derive(Debug, Clone)]
pub enum WalkEntry {
    File(DiscoveredFile),
    /// The path has no exact UTF-8 form, so it cannot be used as a catalog key.
    NonUtf8(PathBuf),
}

/// Sequential, sorted traversal of a volume. Symlinks are not followed,
/// unreadable entries are logged and skipped, and the identity marker is
/// never reported.
pub struct VolumeWalker {
    root: PathBuf,
    ignore_patterns: Vec<Pattern>,
}

impl VolumeWalker {
    pub fn new<S: AsRef<str>>(root: &Path, ignore_globs: &[S]) -> Self {
        let ignore_patterns = ignore_globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob.as_ref()) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob.as_ref(), e);
                    None
                }
            })
            .collect();

        Self {
            root: root.to_path_buf(),
            ignore_patterns,
        }
    }

    pub fn files(&self) -> impl Iterator<Item = WalkEntry> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !self.is_ignored(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Error accessing entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                !(entry.depth() == 1 && is_marker_file_name(&entry.file_name().to_string_lossy()))
            })
            .map(move |entry| match relative_path(&self.root, entry.path()) {
                Some(relative_path) => WalkEntry::File(DiscoveredFile {
                    path: entry.into_path(),
                    relative_path,
                }),
                None => {
                    warn!("Path is not valid UTF-8: {}", entry.path().display());
                    WalkEntry::NonUtf8(entry.into_path())
                }
            })
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || self.ignore_patterns.is_empty() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        let relative = relative_path(&self.root, entry.path()).unwrap_or_default();
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches(&name) || pattern.matches(&relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{MARKER_FILE_NAME, MARKER_TEMP_FILE_NAME};
    use std::fs;
    use tempfile::tempdir;

    fn relative_paths(walker: &VolumeWalker) -> Vec<String> {
        walker
            .files()
            .filter_map(|entry| match entry {
                WalkEntry::File(file) => Some(file.relative_path),
                WalkEntry::NonUtf8(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_walk_sorted_and_nested() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b_dir/inner")).unwrap();
        fs::write(dir.path().join("z.mp3"), b"ID3").unwrap();
        fs::write(dir.path().join("a.txt"), b"text").unwrap();
        fs::write(dir.path().join("b_dir/inner/c.flac"), b"fLaC").unwrap();

        let walker = VolumeWalker::new::<&str>(dir.path(), &[]);
        assert_eq!(
            relative_paths(&walker),
            vec!["a.txt", "b_dir/inner/c.flac", "z.mp3"]
        );
    }

    #[test]
    fn test_walk_skips_marker_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MARKER_FILE_NAME), b"{}").unwrap();
        fs::write(dir.path().join(MARKER_TEMP_FILE_NAME), b"{}").unwrap();
        fs::write(dir.path().join("a.mp3"), b"ID3").unwrap();

        let walker = VolumeWalker::new::<&str>(dir.path(), &[]);
        assert_eq!(relative_paths(&walker), vec!["a.mp3"]);
    }

    #[test]
    fn test_walk_ignore_patterns() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("$RECYCLE.BIN")).unwrap();
        fs::create_dir_all(dir.path().join("music")).unwrap();
        fs::write(dir.path().join("$RECYCLE.BIN/old.mp3"), b"ID3").unwrap();
        fs::write(dir.path().join("music/keep.mp3"), b"ID3").unwrap();
        fs::write(dir.path().join("music/partial.tmp"), b"..").unwrap();

        let walker = VolumeWalker::new(dir.path(), &["$RECYCLE.BIN", "*.tmp", "[bad"]);
        assert_eq!(relative_paths(&walker), vec!["music/keep.mp3"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_reports_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"a\xff.txt")), b"one").unwrap();
        fs::write(dir.path().join("b.txt"), b"two").unwrap();

        let walker = VolumeWalker::new::<&str>(dir.path(), &[]);
        let skipped: Vec<PathBuf> = walker
            .files()
            .filter_map(|entry| match entry {
                WalkEntry::NonUtf8(path) => Some(path),
                WalkEntry::File(_) => None,
            })
            .collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].file_name(), Some(OsStr::from_bytes(b"a\xff.txt")));
        assert_eq!(relative_paths(&walker), vec!["b.txt"]);
    }
}
