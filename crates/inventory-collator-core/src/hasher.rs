use crate::config::DEFAULT_HASH_CHUNK_SIZE;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{error, trace};

/// Chunked SHA-256 content hasher.
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    chunk_size: usize,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_CHUNK_SIZE)
    }
}

impl ContentHasher {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Lowercase hex SHA-256 of the file, or `None` when `skip` is set or
    /// the file cannot be read.
    pub fn hash(&self, path: &Path, skip: bool) -> Option<String> {
        if skip {
            return None;
        }
        match self.hash_file(path) {
            Ok(digest) => {
                trace!(path = %path.display(), "Hashed");
                Some(digest)
            }
            Err(e) => {
                error!("Error hashing '{}': {}", path.display(), e);
                None
            }
        }
    }

    pub fn hash_file(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let bytes_read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}
