use crate::error::Error;
use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_DB_PATH: &str = "inventory.db";
pub const DEFAULT_HASH_CHUNK_SIZE: usize = 1024 * 1024;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_TEST_MODE_FILE_LIMIT: usize = 100;

pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "wav", "aiff", "ogg", "m4a", "aac", "ape", "alac", "wma",
];

/// How a rescan treats files whose size and modified time are unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RescanMode {
    /// Reuse the stored hash and metadata of unchanged files.
    #[default]
    Skip,
    /// Always rehash and re-extract.
    Force,
}

impl FromStr for RescanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(RescanMode::Skip),
            "force" => Ok(RescanMode::Force),
            other => Err(format!("unknown rescan mode '{}' (expected skip or force)", other)),
        }
    }
}

impl fmt::Display for RescanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RescanMode::Skip => f.write_str("skip"),
            RescanMode::Force => f.write_str("force"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    pub audio_extensions: Vec<String>,
    pub hash_chunk_size: usize,
    /// Accept allowed extensions that have no magic-byte signature on record.
    pub permissive_headers: bool,
    pub ignore_patterns: Vec<String>,
    pub batch_size: usize,
    pub test_mode_file_limit: usize,
    pub rescan_mode: RescanMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DB_PATH.to_string(),
            audio_extensions: DEFAULT_AUDIO_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            hash_chunk_size: DEFAULT_HASH_CHUNK_SIZE,
            permissive_headers: false,
            ignore_patterns: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            test_mode_file_limit: DEFAULT_TEST_MODE_FILE_LIMIT,
            rescan_mode: RescanMode::Skip,
        }
    }
}

/// Load `Config.toml` from the working directory if present, then
/// `INVENTORY_*` environment overrides.
pub fn load_configuration() -> Result<AppConfig, Error> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("INVENTORY").try_parsing(true))
        .build()?;
    Ok(builder.try_deserialize::<AppConfig>()?)
}

/// Load an explicit configuration file. Environment overrides still apply.
pub fn load_configuration_from(path: &Path) -> Result<AppConfig, Error> {
    let builder = Config::builder()
        .add_source(ConfigFile::from(path).required(true))
        .add_source(Environment::with_prefix("INVENTORY").try_parsing(true))
        .build()?;
    Ok(builder.try_deserialize::<AppConfig>()?)
}
