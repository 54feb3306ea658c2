use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use lofty::probe::Probe;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, warn};

/// Technical properties and tags of an audio file. Every field is optional;
/// extraction is best-effort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioMetadata {
    pub duration_seconds: Option<f64>,
    /// Kilobits per second.
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub year: Option<u32>,
}

/// Source of audio metadata. Implementations map every internal failure to
/// `None` rather than returning an error.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Option<AudioMetadata>;
}

/// Extractor backed by lofty.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyExtractor;

impl LoftyExtractor {
    pub fn new() -> Self {
        Self
    }

    fn read(path: &Path) -> Result<AudioMetadata, lofty::error::LoftyError> {
        let tagged_file = Probe::open(path)?.guess_file_type()?.read()?;

        let properties = tagged_file.properties();
        let duration = properties.duration();
        let mut metadata = AudioMetadata {
            duration_seconds: (!duration.is_zero()).then(|| duration.as_secs_f64()),
            bitrate: properties.audio_bitrate(),
            sample_rate: properties.sample_rate(),
            channels: properties.channels(),
            ..AudioMetadata::default()
        };

        if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            metadata.artist = tag.artist().map(|s| s.to_string());
            metadata.album = tag.album().map(|s| s.to_string());
            metadata.title = tag.title().map(|s| s.to_string());
            metadata.year = tag.year();
        }

        Ok(metadata)
    }
}

impl MetadataExtractor for LoftyExtractor {
    fn extract(&self, path: &Path) -> Option<AudioMetadata> {
        // lofty can panic on malformed input.
        match panic::catch_unwind(AssertUnwindSafe(|| Self::read(path))) {
            Ok(Ok(metadata)) => {
                debug!(
                    file = %path.display(),
                    artist = ?metadata.artist,
                    title = ?metadata.title,
                    duration_s = ?metadata.duration_seconds,
                    "Extracted metadata"
                );
                Some(metadata)
            }
            Ok(Err(e)) => {
                warn!("Metadata extraction failed for {}: {}", path.display(), e);
                None
            }
            Err(_) => {
                warn!("Metadata extraction panicked for {}", path.display());
                None
            }
        }
    }
}
