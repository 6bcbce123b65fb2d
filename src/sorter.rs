//! The sort run: enumerate, dispatch, collect.
//!
//! Every regular file under the input directory becomes one unit. Units run
//! on a fixed-size rayon pool through filter, date resolution,
//! classification, destination allocation, optional transform and move.
//! Results are collected in submission order, so progress is reported as
//! 1..N over the enumeration order and the report is only ever touched from
//! the calling thread.

use crate::capture_date::resolve_capture_date;
use crate::classifier::PathClassifier;
use crate::collision::DestinationAllocator;
use crate::config::{ConfigError, SortConfig, SortSettings};
use crate::exif_export::{CSV_FILE_NAME, export_exif_csv};
use crate::file_filter::MediaKind;
use crate::ledger::{LEDGER_FILE_NAME, MoveLedger};
use crate::mover::{MoveError, MoveExecutor, MovePlan, MoveRecord, Outcome};
use crate::report::{Report, ReportAggregator};
use crate::transform::MediaTransformer;
use log::{debug, error, info, warn};
use rayon::ThreadPoolBuilder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use walkdir::WalkDir;

/// Errors that stop a run before or while it starts.
#[derive(Debug, thiserror::Error)]
pub enum SortError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Input path {} is not a directory", .0.display())]
    InvalidInput(PathBuf),
    #[error("Cannot resolve {}: {source}", path.display())]
    PathResolution { path: PathBuf, source: io::Error },
    #[error("Failed to create output directory {}: {source}", path.display())]
    OutputCreation { path: PathBuf, source: io::Error },
    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// What happened to one unit, handed to the reporter as it is collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitResult {
    pub source: PathBuf,
    pub outcome: Outcome,
    /// The (real or simulated) destination for moved files.
    pub destination: Option<PathBuf>,
}

/// Receives progress from a run, always from the thread that called [`Sorter::run`].
pub trait ProgressReporter {
    fn on_start(&self, _total: usize) {}

    /// Called once per finished unit, with `completed` counting up from 1.
    fn on_progress(&self, completed: usize, total: usize);

    fn on_unit(&self, _result: &UnitResult) {}

    fn on_finish(&self) {}
}

impl<F: Fn(usize, usize)> ProgressReporter for F {
    fn on_progress(&self, completed: usize, total: usize) {
        self(completed, total)
    }
}

/// Runs sorts with one validated configuration.
pub struct Sorter {
    settings: SortSettings,
    shutdown_signal: Arc<AtomicBool>,
}

impl Sorter {
    pub fn new(settings: SortSettings, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            settings,
            shutdown_signal,
        }
    }

    /// Validates `config` and builds a sorter from it.
    pub fn from_config(
        config: SortConfig,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Result<Self, SortError> {
        Ok(Self::new(config.compile()?, shutdown_signal))
    }

    pub fn settings(&self) -> &SortSettings {
        &self.settings
    }

    /// Sorts every file under `input` into `output`.
    ///
    /// Per-file failures end up in the report, never as an `Err`. Raising the
    /// shutdown signal stops new units from starting; units already running
    /// finish.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use snapsort::config::SortConfig;
    /// use snapsort::sorter::Sorter;
    /// use std::path::Path;
    /// use std::sync::Arc;
    /// use std::sync::atomic::AtomicBool;
    ///
    /// let sorter = Sorter::from_config(SortConfig::default(), Arc::new(AtomicBool::new(false)))?;
    /// let progress = |done: usize, total: usize| println!("{}/{}", done, total);
    /// let report = sorter.run(Path::new("/photos/inbox"), Path::new("/photos/sorted"), &progress)?;
    /// println!("{}", report);
    /// # Ok::<(), snapsort::sorter::SortError>(())
    /// ```
    pub fn run(
        &self,
        input: &Path,
        output: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<Report, SortError> {
        if !input.is_dir() {
            return Err(SortError::InvalidInput(input.to_path_buf()));
        }
        let output = &absolute_path(output)?;
        let dry_run = self.settings.dry_run;
        if !dry_run {
            fs::create_dir_all(output).map_err(|e| SortError::OutputCreation {
                path: output.to_path_buf(),
                source: e,
            })?;
        }

        let candidates = collect_candidates(input, output)?;
        let total = candidates.len();
        info!(
            "Sorting {} files from {} into {}{}",
            total,
            input.display(),
            output.display(),
            if dry_run { " (dry run)" } else { "" }
        );
        reporter.on_start(total);

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.settings.workers)
            .thread_name(|i| format!("snapsort-worker-{}", i))
            .panic_handler(|_| error!("A worker panicked while processing a file"))
            .build()?;
        let pipeline = Arc::new(Pipeline::new(
            &self.settings,
            output,
            Arc::clone(&self.shutdown_signal),
        ));

        let receivers: Vec<_> = candidates
            .into_iter()
            .map(|path| {
                let (tx, rx) = mpsc::sync_channel(1);
                let pipeline = Arc::clone(&pipeline);
                pool.spawn(move || {
                    let result = pipeline.run_unit(path);
                    let _ = tx.send(result);
                });
                rx
            })
            .collect();

        let mut aggregator = ReportAggregator::new(dry_run);
        for rx in receivers {
            match rx.recv() {
                Ok(Some(result)) => {
                    aggregator.record(result.outcome);
                    reporter.on_unit(&result);
                }
                Ok(None) => {
                    aggregator.record_not_started();
                    continue;
                }
                Err(_) => aggregator.record(Outcome::Error),
            }
            reporter.on_progress(aggregator.processed(), total);
        }
        reporter.on_finish();

        let mut report = aggregator.finish();
        if report.was_cancelled() {
            warn!("Run cancelled; {} files were not started", report.not_started);
        }
        if self.settings.export_csv {
            report.csv_export = self.export(output);
        }
        info!("Sort finished.\n{}", report);
        Ok(report)
    }

    fn export(&self, output: &Path) -> Option<PathBuf> {
        if self.settings.dry_run {
            info!("Dry run: skipping EXIF export");
            return None;
        }
        let csv_path = output.join(CSV_FILE_NAME);
        match export_exif_csv(output, &csv_path) {
            Ok(_) => Some(csv_path),
            Err(e) => {
                error!("EXIF export failed: {}", e);
                None
            }
        }
    }
}

/// Lists every regular file under `input` in file-name order.
///
/// The output subtree (when nested inside the input), the ledger and the
/// CSV export are never candidates.
pub fn collect_candidates(input: &Path, output: &Path) -> Result<Vec<PathBuf>, SortError> {
    let input = absolute_path(input)?;
    let output = absolute_path(output)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(&input)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.path() != output);
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let name = entry.file_name();
                if name == LEDGER_FILE_NAME || name == CSV_FILE_NAME {
                    continue;
                }
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry: {}", e),
        }
    }
    Ok(files)
}

/// Anchors `path` to the current directory so recorded paths stay valid
/// wherever a restore is run from.
fn absolute_path(path: &Path) -> Result<PathBuf, SortError> {
    std::path::absolute(path).map_err(|e| SortError::PathResolution {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Everything a worker needs, shared across the pool.
struct Pipeline {
    settings: SortSettings,
    classifier: PathClassifier,
    allocator: DestinationAllocator,
    executor: MoveExecutor,
    transformer: Option<MediaTransformer>,
    ledger: MoveLedger,
    shutdown_signal: Arc<AtomicBool>,
}

impl Pipeline {
    fn new(settings: &SortSettings, output: &Path, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            settings: settings.clone(),
            classifier: PathClassifier::new(output, settings.pattern.clone()),
            allocator: DestinationAllocator::new(),
            executor: MoveExecutor::new(settings.dry_run),
            transformer: settings.optimize.map(MediaTransformer::new),
            ledger: MoveLedger::new(output),
            shutdown_signal,
        }
    }

    /// Processes one file, or returns `None` if the run was cancelled first.
    fn run_unit(&self, source: PathBuf) -> Option<UnitResult> {
        if self.shutdown_signal.load(Ordering::SeqCst) {
            return None;
        }
        let (outcome, destination) = self.process(&source);
        Some(UnitResult {
            source,
            outcome,
            destination,
        })
    }

    fn process(&self, source: &Path) -> (Outcome, Option<PathBuf>) {
        let size = match fs::metadata(source) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                error!("Cannot read {}: {}", source.display(), e);
                return (Outcome::Error, None);
            }
        };

        if self.settings.exclusions.is_excluded(source) {
            info!("Filtered: {} (excluded)", source.display());
            return (Outcome::Filtered, None);
        }
        if let Err(rejection) = self.settings.filter.check(source, size) {
            info!("Filtered: {} ({})", source.display(), rejection);
            return (Outcome::Filtered, None);
        }

        let date = resolve_capture_date(source);
        let destination = self.classifier.classify(source, date.as_ref());
        if let Err(e) = self
            .classifier
            .prepare_directory(&destination, self.settings.dry_run)
        {
            error!(
                "{}",
                MoveError::DirectoryCreationFailed {
                    path: destination.directory.clone(),
                    source: e,
                }
            );
            return (Outcome::Error, None);
        }

        let final_path = self.allocator.allocate(&destination.candidate_path());
        let plan = MovePlan {
            original: source.to_path_buf(),
            staged: self.stage(source, &final_path),
            destination: final_path,
            dated: destination.dated,
        };

        match self.executor.execute(&plan) {
            Ok(Some(record)) => (self.record(record, &plan), Some(plan.destination)),
            Ok(None) => (plan.success_outcome(), Some(plan.destination)),
            Err(e) => {
                error!("{}", e);
                self.allocator.release(&plan.destination);
                (Outcome::Error, None)
            }
        }
    }

    fn stage(&self, source: &Path, final_path: &Path) -> Option<PathBuf> {
        let transformer = self.transformer.as_ref()?;
        if self.executor.is_dry_run()
            || self.settings.filter.allowlist().kind_of(source) != Some(MediaKind::Image)
        {
            return None;
        }
        match transformer.stage(source, final_path) {
            Ok(staged) => Some(staged),
            Err(e) => {
                warn!("{}; moving the original instead", e);
                None
            }
        }
    }

    /// Appends `record` to the ledger; a move that cannot be recorded is reverted.
    fn record(&self, record: MoveRecord, plan: &MovePlan) -> Outcome {
        match self.ledger.append(&record) {
            Ok(()) => {
                debug!("Recorded move of {}", record.original.display());
                plan.success_outcome()
            }
            Err(e) => {
                error!(
                    "{}",
                    MoveError::RecordFailed {
                        original: record.original.clone(),
                        reason: e.to_string(),
                    }
                );
                if let Err(revert) = self.executor.revert(&record) {
                    error!(
                        "Could not move {} back to {}: {}",
                        record.destination.display(),
                        record.original.display(),
                        revert
                    );
                }
                Outcome::Error
            }
        }
    }
}
