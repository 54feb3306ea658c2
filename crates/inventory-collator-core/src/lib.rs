pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod identity;
pub mod metadata;
pub mod progress;
pub mod scanner;
pub mod storage;

pub use config::{AppConfig, RescanMode};
pub use engine::{ScanEngine, ScanOptions, ScanPhase, ScanSummary};
pub use error::Error;
pub use metadata::{AudioMetadata, LoftyExtractor, MetadataExtractor};
pub use progress::{ProgressReporter, SilentReporter};
pub use storage::{CatalogStore, Database};
