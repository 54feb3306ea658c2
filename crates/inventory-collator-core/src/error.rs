use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Identity marker error: {0}")]
    Marker(#[from] serde_json::Error),

    #[error("Volume root not found: {0}")]
    VolumeNotFound(PathBuf),

    #[error("Volume root is not a directory: {0}")]
    NotADirectory(PathBuf),
}
