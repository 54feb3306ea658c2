use crate::classifier::{normalized_extension, Classifier};
use crate::config::{AppConfig, RescanMode};
use crate::error::Error;
use crate::hasher::ContentHasher;
use crate::identity;
use crate::metadata::{LoftyExtractor, MetadataExtractor};
use crate::progress::ProgressReporter;
use crate::scanner::{DiscoveredFile, VolumeWalker, WalkEntry};
use crate::storage::models::{
    FileRecord, MetadataUpdate, PriorFileState, RunCounters, RunStatus, VolumeRegistration,
};
use crate::storage::{timestamp_now, CatalogStore};
use chrono::{DateTime, SecondsFormat, Utc};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

/// Lifecycle of one scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    NotStarted,
    MarkingMissing,
    Walking,
    Finalizing,
    Done,
}

/// Per-run settings supplied by the caller.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub volume_root: PathBuf,
    /// Skip content hashing.
    pub fast: bool,
    pub force_new_identity: bool,
    /// Stop after this many files.
    pub file_limit: Option<usize>,
    pub label: Option<String>,
    pub rescan_mode: RescanMode,
    /// Checked between files; setting it ends the walk early.
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

impl ScanOptions {
    pub fn new(volume_root: impl Into<PathBuf>) -> Self {
        Self {
            volume_root: volume_root.into(),
            fast: false,
            force_new_identity: false,
            file_limit: None,
            label: None,
            rescan_mode: RescanMode::default(),
            cancel_flag: None,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }
}

/// Result of a scan, returned to the calling shell.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub volume_key: String,
    /// A new identity marker was written during this scan.
    pub identity_created: bool,
    /// The catalog had no record of this volume before the scan.
    pub volume_registered: bool,
    pub run_id: i64,
    pub files_seen: u64,
    pub audio_files: u64,
    pub bytes_scanned: u64,
    pub hashed_files: u64,
    pub reused_hashes: u64,
    /// Files skipped because of an I/O error.
    pub skipped_files: u64,
    /// Entries flagged missing before the walk.
    pub marked_missing: usize,
    /// Entries still missing after the walk.
    pub missing_files: usize,
    /// False when the walk was cancelled or hit the file limit.
    pub completed: bool,
    pub duration: Duration,
}

#[derive(Debug, Default)]
struct WalkCounters {
    files_seen: u64,
    audio_files: u64,
    bytes_scanned: u64,
    hashed_files: u64,
    reused_hashes: u64,
    skipped_files: u64,
}

/// Borrowed state shared by every batch of one walk.
struct WalkContext<'a> {
    store: &'a dyn CatalogStore,
    options: &'a ScanOptions,
    volume_key: &'a str,
    seen_at: &'a str,
    reporter: &'a dyn ProgressReporter,
}

enum Observation {
    Recorded {
        record: FileRecord,
        hashed: bool,
        reused_hash: bool,
    },
    Skipped,
    Cancelled,
}

pub struct ScanEngine {
    config: AppConfig,
    classifier: Classifier,
    hasher: ContentHasher,
    extractor: Box<dyn MetadataExtractor>,
}

impl ScanEngine {
    pub fn new(config: AppConfig) -> Self {
        Self {
            classifier: Classifier::from_config(&config),
            hasher: ContentHasher::new(config.hash_chunk_size),
            extractor: Box::new(LoftyExtractor::new()),
            config,
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn MetadataExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Scan one volume into the catalog:
    /// 1. Resolve the volume identity and register the volume
    /// 2. Mark every active entry of the volume missing
    /// 3. Walk the tree, classify/hash/extract in parallel batches, upsert in walk order
    /// 4. Record the run outcome
    pub fn scan(
        &self,
        store: &dyn CatalogStore,
        options: &ScanOptions,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanSummary, Error> {
        let started = Instant::now();
        let mut phase = ScanPhase::NotStarted;
        let root = &options.volume_root;

        match fs::metadata(root) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(Error::NotADirectory(root.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::VolumeNotFound(root.clone()))
            }
            Err(e) => return Err(e.into()),
        }

        let identity = identity::resolve_identity(root, options.force_new_identity)?;
        let volume_key = identity.volume_key;
        let seen_at = timestamp_now();

        let volume_registered = store.register_volume(
            &VolumeRegistration {
                volume_key: volume_key.clone(),
                label: options.label.clone(),
                root_path: root.to_string_lossy().into_owned(),
                total_bytes: None,
                free_bytes: None,
            },
            &seen_at,
        )?;
        let run_id = store.begin_scan_run(&volume_key, &root.to_string_lossy())?;

        advance(&mut phase, ScanPhase::MarkingMissing, reporter);
        let marked_missing = store.mark_active_as_missing(&volume_key)?;
        reporter.on_mark_missing(marked_missing);

        advance(&mut phase, ScanPhase::Walking, reporter);
        let walk_start = Instant::now();
        let mut counters = WalkCounters::default();
        let context = WalkContext {
            store,
            options,
            volume_key: &volume_key,
            seen_at: &seen_at,
            reporter,
        };
        let walk_result = self.walk(&context, &mut counters);
        reporter.on_walk_complete(counters.files_seen, walk_start.elapsed().as_secs_f64());

        advance(&mut phase, ScanPhase::Finalizing, reporter);
        let completed = match walk_result {
            Ok(completed) => completed,
            Err(e) => {
                let counters = run_counters(&counters, 0);
                if let Err(finish_err) =
                    store.finish_scan_run(run_id, RunStatus::Interrupted, &counters)
                {
                    warn!("Unable to record interrupted scan run {}: {}", run_id, finish_err);
                }
                return Err(e);
            }
        };

        let missing_files = store.count_missing(&volume_key)?;
        let status = if completed {
            RunStatus::Completed
        } else {
            RunStatus::Interrupted
        };
        store.finish_scan_run(run_id, status, &run_counters(&counters, missing_files))?;
        if completed {
            info!("Walk of {} completed cleanly", root.display());
        } else {
            info!(
                "Walk of {} stopped early; unvisited entries stay missing until a full scan",
                root.display()
            );
        }

        advance(&mut phase, ScanPhase::Done, reporter);
        let summary = ScanSummary {
            volume_key,
            identity_created: identity.created,
            volume_registered,
            run_id,
            files_seen: counters.files_seen,
            audio_files: counters.audio_files,
            bytes_scanned: counters.bytes_scanned,
            hashed_files: counters.hashed_files,
            reused_hashes: counters.reused_hashes,
            skipped_files: counters.skipped_files,
            marked_missing,
            missing_files,
            completed,
            duration: started.elapsed(),
        };
        debug!(?summary, "Scan finished");
        Ok(summary)
    }

    /// Returns false when the walk ended before visiting every file.
    fn walk(&self, context: &WalkContext<'_>, counters: &mut WalkCounters) -> Result<bool, Error> {
        let options = context.options;
        let walker = VolumeWalker::new(&options.volume_root, &self.config.ignore_patterns);
        let batch_size = self.config.batch_size.max(1);
        let mut batch: Vec<DiscoveredFile> = Vec::with_capacity(batch_size);
        let mut discovered = 0usize;
        let mut completed = true;

        for entry in walker.files() {
            if options.is_cancelled() {
                info!("Scan cancelled after {} files", discovered);
                completed = false;
                break;
            }
            if options.file_limit.map_or(false, |limit| discovered >= limit) {
                info!("File limit of {} reached", discovered);
                completed = false;
                break;
            }

            let file = match entry {
                WalkEntry::File(file) => file,
                WalkEntry::NonUtf8(_) => {
                    counters.skipped_files += 1;
                    continue;
                }
            };

            discovered += 1;
            batch.push(file);
            if batch.len() >= batch_size {
                if !self.process_batch(context, &batch, counters)? {
                    completed = false;
                }
                batch.clear();
            }
        }

        if !batch.is_empty() && !self.process_batch(context, &batch, counters)? {
            completed = false;
        }

        Ok(completed)
    }

    /// Observe a batch in parallel, then upsert the results in walk order.
    /// Returns false when cancellation cut the batch short.
    fn process_batch(
        &self,
        context: &WalkContext<'_>,
        batch: &[DiscoveredFile],
        counters: &mut WalkCounters,
    ) -> Result<bool, Error> {
        let WalkContext {
            store,
            options,
            volume_key,
            seen_at,
            reporter,
        } = *context;
        let priors: Vec<Option<PriorFileState>> = match options.rescan_mode {
            RescanMode::Skip => batch
                .iter()
                .map(|file| store.prior_file_state(volume_key, &file.relative_path))
                .collect::<Result<_, _>>()?,
            RescanMode::Force => vec![None; batch.len()],
        };

        let observations: Vec<Observation> = batch
            .par_iter()
            .zip(priors.par_iter())
            .map(|(file, prior)| self.observe(file, prior.as_ref(), options, volume_key))
            .collect();

        let mut records = Vec::with_capacity(batch.len());
        let mut cancelled = false;
        for observation in observations {
            match observation {
                Observation::Recorded {
                    record,
                    hashed,
                    reused_hash,
                } => {
                    counters.files_seen += 1;
                    counters.bytes_scanned += record.size_bytes as u64;
                    if record.header_valid {
                        counters.audio_files += 1;
                    }
                    if hashed {
                        counters.hashed_files += 1;
                    }
                    if reused_hash {
                        counters.reused_hashes += 1;
                    }
                    reporter.on_file_processed(counters.files_seen, &record.relative_path);
                    records.push(record);
                }
                Observation::Skipped => counters.skipped_files += 1,
                Observation::Cancelled => cancelled = true,
            }
        }

        store.upsert_files(&records, seen_at)?;
        Ok(!cancelled)
    }

    /// Classify, hash and extract one file. Never fails: I/O errors turn
    /// into `Skipped` or absent fields.
    fn observe(
        &self,
        file: &DiscoveredFile,
        prior: Option<&PriorFileState>,
        options: &ScanOptions,
        volume_key: &str,
    ) -> Observation {
        if options.is_cancelled() {
            return Observation::Cancelled;
        }

        let fs_metadata = match fs::metadata(&file.path) {
            Ok(m) => m,
            Err(e) => {
                warn!("Skipping {}: {}", file.path.display(), e);
                return Observation::Skipped;
            }
        };

        let size_bytes = fs_metadata.len() as i64;
        let modified_fs = fs_metadata.modified().ok().map(format_fs_time);
        let created_fs = fs_metadata.created().ok().map(format_fs_time);
        let is_audio = self.classifier.classify(&file.path).is_audio();

        let unchanged = prior.filter(|prior| {
            prior.size_bytes == size_bytes
                && prior.modified_fs.is_some()
                && prior.modified_fs == modified_fs
                && prior.header_valid == is_audio
        });

        let mut hashed = false;
        let mut reused_hash = false;
        let (content_hash, metadata) = if is_audio {
            let content_hash = match unchanged.and_then(|prior| prior.content_hash.clone()) {
                Some(stored) => {
                    reused_hash = true;
                    Some(stored)
                }
                None => {
                    let digest = self.hasher.hash(&file.path, options.fast);
                    hashed = digest.is_some();
                    digest
                }
            };

            let metadata = if unchanged.map_or(false, |prior| prior.has_metadata) {
                MetadataUpdate::Keep
            } else {
                match self.extractor.extract(&file.path) {
                    Some(metadata) => MetadataUpdate::Replace(metadata),
                    None => MetadataUpdate::Clear,
                }
            };
            (content_hash, metadata)
        } else {
            (None, MetadataUpdate::Clear)
        };

        let file_name = file
            .relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&file.relative_path)
            .to_string();

        Observation::Recorded {
            record: FileRecord {
                volume_key: volume_key.to_string(),
                relative_path: file.relative_path.clone(),
                file_name,
                extension: normalized_extension(&file.path),
                size_bytes,
                created_fs,
                modified_fs,
                header_valid: is_audio,
                content_hash,
                metadata,
            },
            hashed,
            reused_hash,
        }
    }
}

fn advance(phase: &mut ScanPhase, next: ScanPhase, reporter: &dyn ProgressReporter) {
    debug!("Scan phase {:?} -> {:?}", phase, next);
    *phase = next;
    reporter.on_phase(next);
}

fn run_counters(counters: &WalkCounters, missing_files: usize) -> RunCounters {
    RunCounters {
        files_seen: counters.files_seen,
        audio_files: counters.audio_files,
        bytes_scanned: counters.bytes_scanned,
        missing_files: missing_files as u64,
    }
}

fn format_fs_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Nanos, true)
}
