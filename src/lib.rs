//! snapsort - sort photos and videos into dated folders
//!
//! This library resolves a capture date for each media file (EXIF metadata
//! first, then camera-style file names), moves files into
//! `<output>/<year>/<month>/` under a configurable name, and records every move
//! in a ledger so a run can be restored. Undatable files go to `Others`.

pub mod capture_date;
pub mod classifier;
pub mod cli;
pub mod collision;
pub mod config;
pub mod exif_export;
pub mod file_filter;
pub mod ledger;
pub mod mover;
pub mod output;
pub mod report;
pub mod sorter;
pub mod transform;
pub mod undo;

pub use capture_date::{CaptureDate, resolve_capture_date};
pub use classifier::{FilenamePattern, PathClassifier};
pub use config::{ConfigError, Overrides, SortConfig, SortSettings};
pub use ledger::MoveLedger;
pub use mover::{MoveRecord, Outcome};
pub use report::Report;
pub use sorter::{ProgressReporter, SortError, Sorter};
pub use undo::{RestoreEngine, RestoreOutcome, RestoreReport};

pub use cli::{Command, run_cli};
