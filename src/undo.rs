/// Undo functionality for reverting a sort run.
///
/// This module replays the move ledger of an output root in reverse, moving
/// every recorded file back to its original location. Each reversal is
/// independent, and the ledger is deleted once the pass completes, whether or
/// not every reversal succeeded.
use crate::ledger::{LedgerResult, MoveLedger};
use crate::mover::{MoveRecord, relocate};
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Represents the result of a restore pass.
#[derive(Debug, Default)]
pub struct RestoreReport {
    /// Number of files successfully restored.
    pub restored_files: usize,
    /// Files that failed to restore, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Files that were no longer at their recorded destination.
    pub skipped_files: Vec<(PathBuf, String)>,
}

impl RestoreReport {
    /// Returns the total number of records processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// Number of records that did not end up back at their original path.
    pub fn error_count(&self) -> usize {
        self.failed_restores.len() + self.skipped_files.len()
    }

    /// Returns true if every record was restored.
    pub fn is_complete_success(&self) -> bool {
        self.error_count() == 0
    }
}

/// What a restore request did.
#[derive(Debug)]
pub enum RestoreOutcome {
    /// There was no ledger; nothing was touched.
    NothingToRestore,
    /// The ledger was replayed and deleted.
    Completed(RestoreReport),
}

/// Replays move ledgers in reverse.
pub struct RestoreEngine;

impl RestoreEngine {
    /// Undoes every recorded move under `output_root`.
    ///
    /// Records are processed newest first. A file occupying an original path
    /// is backed up with a timestamp suffix before the restore. Missing
    /// original directories are recreated.
    ///
    /// # Errors
    ///
    /// Only ledger-level problems (unreadable or malformed ledger, failure to
    /// delete it) are errors. Per-record failures are counted in the report.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use snapsort::undo::{RestoreEngine, RestoreOutcome};
    /// use std::path::Path;
    ///
    /// match RestoreEngine::restore(Path::new("/path/to/sorted")) {
    ///     Ok(RestoreOutcome::Completed(report)) => println!("Restored {} files", report.restored_files),
    ///     Ok(RestoreOutcome::NothingToRestore) => println!("Nothing to restore"),
    ///     Err(e) => eprintln!("Restore failed: {}", e),
    /// }
    /// ```
    pub fn restore(output_root: &Path) -> LedgerResult<RestoreOutcome> {
        let Some(contents) = MoveLedger::load(output_root)? else {
            info!("No move ledger found in {}", output_root.display());
            return Ok(RestoreOutcome::NothingToRestore);
        };

        let mut report = RestoreReport::default();
        for record in contents.records.iter().rev() {
            match Self::restore_file(record) {
                Ok(()) => {
                    info!(
                        "Restored: {} to {}",
                        record.destination.display(),
                        record.original.display()
                    );
                    report.restored_files += 1;
                }
                Err(RestoreFailure::Missing(path, reason)) => {
                    warn!("Skipped {}: {}", path.display(), reason);
                    report.skipped_files.push((path, reason));
                }
                Err(RestoreFailure::Failed(path, reason)) => {
                    error!("Failed to restore {}: {}", path.display(), reason);
                    report.failed_restores.push((path, reason));
                }
            }
        }

        MoveLedger::delete(output_root)?;
        Ok(RestoreOutcome::Completed(report))
    }

    /// Restores a single file to its original location.
    fn restore_file(record: &MoveRecord) -> Result<(), RestoreFailure> {
        if !record.destination.exists() {
            return Err(RestoreFailure::Missing(
                record.destination.clone(),
                "File not found at expected location".to_string(),
            ));
        }

        if let Some(parent) = record.original.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                RestoreFailure::Failed(
                    record.original.clone(),
                    format!("Could not recreate directory {}: {}", parent.display(), e),
                )
            })?;
        }

        if record.original.exists() {
            let backup_path = Self::generate_backup_path(&record.original);
            fs::rename(&record.original, &backup_path).map_err(|e| {
                RestoreFailure::Failed(
                    record.original.clone(),
                    format!("Could not backup conflicting file: {}", e),
                )
            })?;
            warn!(
                "Backed up conflicting {} to {}",
                record.original.display(),
                backup_path.display()
            );
        }

        relocate(&record.destination, &record.original).map_err(|e| {
            RestoreFailure::Failed(
                record.destination.clone(),
                format!("Failed to restore file: {}", e),
            )
        })
    }

    /// Generates a backup path for a file by appending a timestamp.
    ///
    /// Example: `photo.jpg` becomes `photo.jpg.bak.20251109-143052`
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        original_path.with_file_name(format!("{}.bak.{}", filename, timestamp))
    }
}

enum RestoreFailure {
    Missing(PathBuf, String),
    Failed(PathBuf, String),
}
