/// Filesystem relocation of sorted files.
///
/// This module performs (or, in dry-run mode, only logs) the move of one file
/// to its resolved destination and classifies the outcome. A successful real
/// move produces a [`MoveRecord`] for the ledger.
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Final state of one source file after a run. Exactly one per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Relocated into a dated `<year>/<month>` directory.
    Moved,
    /// Relocated into the `Others` bucket.
    PlacedInOther,
    /// Rejected by the filter and left untouched.
    Filtered,
    /// Something failed for this file; it was left where it was.
    Error,
}

/// A single successful move, as written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Where the file was before the run.
    pub original: PathBuf,
    /// Where the file ended up.
    pub destination: PathBuf,
}

/// Errors that can occur while relocating a file.
#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    /// Failed to create a destination directory.
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },
    /// Failed to move a file to its destination.
    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    /// The move succeeded but could not be recorded, and was reverted.
    #[error("Moved {} but could not record it: {reason}", original.display())]
    RecordFailed { original: PathBuf, reason: String },
}

/// Result type for move operations.
pub type MoveResult<T> = Result<T, MoveError>;

/// Everything the executor needs to relocate one file.
#[derive(Debug, Clone)]
pub struct MovePlan {
    /// The source file as found in the input tree.
    pub original: PathBuf,
    /// The collision-free final path.
    pub destination: PathBuf,
    /// A transformed artifact to relocate instead of the original bytes.
    pub staged: Option<PathBuf>,
    /// Whether the destination came from a capture date.
    pub dated: bool,
}

impl MovePlan {
    /// The outcome this plan produces when it succeeds.
    pub fn success_outcome(&self) -> Outcome {
        if self.dated {
            Outcome::Moved
        } else {
            Outcome::PlacedInOther
        }
    }
}

/// Performs or simulates moves.
#[derive(Debug, Clone, Copy)]
pub struct MoveExecutor {
    dry_run: bool,
}

impl MoveExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Executes `plan`.
    ///
    /// In dry-run mode only the decision is logged and `Ok(None)` is returned.
    /// Otherwise the file (or its staged artifact) is relocated and the
    /// resulting record is returned for the ledger.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use snapsort::mover::{MoveExecutor, MovePlan};
    /// use std::path::PathBuf;
    ///
    /// let plan = MovePlan {
    ///     original: PathBuf::from("/in/IMG_20230401_153000.jpg"),
    ///     destination: PathBuf::from("/out/2023/04/2023_04_01_153000.jpg"),
    ///     staged: None,
    ///     dated: true,
    /// };
    /// match MoveExecutor::new(false).execute(&plan) {
    ///     Ok(Some(record)) => println!("moved to {}", record.destination.display()),
    ///     Ok(None) => println!("dry run"),
    ///     Err(e) => eprintln!("{}", e),
    /// }
    /// ```
    pub fn execute(&self, plan: &MovePlan) -> MoveResult<Option<MoveRecord>> {
        if self.dry_run {
            info!(
                "Simulated: move {} to {}",
                plan.original.display(),
                plan.destination.display()
            );
            return Ok(None);
        }

        if let Some(parent) = plan.destination.parent() {
            fs::create_dir_all(parent).map_err(|e| MoveError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        match &plan.staged {
            Some(staged) => self.place_staged(plan, staged)?,
            None => relocate(&plan.original, &plan.destination).map_err(|e| {
                MoveError::FileMoveFailure {
                    from: plan.original.clone(),
                    to: plan.destination.clone(),
                    source: e,
                }
            })?,
        }

        info!(
            "Moved: {} to {}",
            plan.original.display(),
            plan.destination.display()
        );
        Ok(Some(MoveRecord {
            original: plan.original.clone(),
            destination: plan.destination.clone(),
        }))
    }

    fn place_staged(&self, plan: &MovePlan, staged: &Path) -> MoveResult<()> {
        if let Err(e) = fs::rename(staged, &plan.destination) {
            if let Err(cleanup) = fs::remove_file(staged) {
                warn!("Could not remove staged {}: {}", staged.display(), cleanup);
            }
            return Err(MoveError::FileMoveFailure {
                from: staged.to_path_buf(),
                to: plan.destination.clone(),
                source: e,
            });
        }
        if let Err(e) = fs::remove_file(&plan.original) {
            warn!(
                "Optimized copy placed but original {} could not be removed: {}",
                plan.original.display(),
                e
            );
        }
        Ok(())
    }

    /// Moves a recorded file back to where it came from. Used to undo a move
    /// that could not be written to the ledger.
    pub fn revert(&self, record: &MoveRecord) -> io::Result<()> {
        relocate(&record.destination, &record.original)
    }
}

/// Renames `from` to `to`, falling back to copy-and-delete across filesystems.
pub fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_then_remove(from, to, |p| fs::remove_file(p))
        }
        Err(e) => Err(e),
    }
}

/// Copies `from` to `to`, then removes the source with `remove_source`.
///
/// If the source cannot be removed the copy is deleted again, so a failed
/// relocation never leaves the file in two places.
fn copy_then_remove(
    from: &Path,
    to: &Path,
    remove_source: impl FnOnce(&Path) -> io::Result<()>,
) -> io::Result<()> {
    fs::copy(from, to)?;
    if let Err(e) = remove_source(from) {
        if let Err(cleanup) = fs::remove_file(to) {
            warn!("Could not remove partial copy {}: {}", to.display(), cleanup);
        }
        return Err(e);
    }
    Ok(())
}
