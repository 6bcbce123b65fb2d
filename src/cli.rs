//! Command-line interface module for snapsort.
//!
//! This module turns parsed commands into library calls:
//! - `sort` loads the configuration, applies flag overrides, and runs a sort
//! - `restore` replays the move ledger of an output directory
//!
//! Argument parsing itself lives in the binary.

use crate::config::{Overrides, SortConfig};
use crate::output::{BarProgress, OutputFormatter};
use crate::report::restore_summary;
use crate::sorter::Sorter;
use crate::undo::{RestoreEngine, RestoreOutcome};
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// A command to execute.
#[derive(Debug, Clone)]
pub enum Command {
    /// Sort `input` into `output`.
    Sort {
        input: PathBuf,
        output: PathBuf,
        config: Option<PathBuf>,
        overrides: Overrides,
    },
    /// Undo every recorded move under `output`.
    Restore { output: PathBuf },
}

/// Runs `command`, printing progress and results to the terminal.
///
/// # Examples
///
/// ```no_run
/// use snapsort::cli::{Command, run_cli};
/// use std::path::PathBuf;
/// use std::sync::Arc;
/// use std::sync::atomic::AtomicBool;
///
/// let command = Command::Restore { output: PathBuf::from("/photos/sorted") };
/// if let Err(e) = run_cli(command, Arc::new(AtomicBool::new(false))) {
///     eprintln!("Error: {:#}", e);
/// }
/// ```
pub fn run_cli(command: Command, shutdown_signal: Arc<AtomicBool>) -> anyhow::Result<()> {
    match command {
        Command::Sort {
            input,
            output,
            config,
            overrides,
        } => sort(&input, &output, config.as_deref(), &overrides, shutdown_signal),
        Command::Restore { output } => restore(&output),
    }
}

fn sort(
    input: &Path,
    output: &Path,
    config_path: Option<&Path>,
    overrides: &Overrides,
    shutdown_signal: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let config = SortConfig::load(config_path)
        .context("Error loading configuration")?
        .with_overrides(overrides);
    let sorter = Sorter::from_config(config, shutdown_signal).context("Invalid configuration")?;

    if sorter.settings().dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "Analyzing {} (nothing will be moved)",
            input.display()
        ));
    } else {
        OutputFormatter::info(&format!(
            "Sorting {} into {}",
            input.display(),
            output.display()
        ));
    }

    let progress = BarProgress::new();
    let report = sorter
        .run(input, output, &progress)
        .with_context(|| format!("Could not sort {}", input.display()))?;

    OutputFormatter::report_table(&report);
    if report.errors > 0 {
        OutputFormatter::warning("Some files could not be sorted. See the log for details.");
    } else if !report.dry_run && report.moved + report.placed_in_other > 0 {
        OutputFormatter::success(&format!(
            "Done. Use 'snapsort restore {}' to revert.",
            output.display()
        ));
    }
    Ok(())
}

fn restore(output: &Path) -> anyhow::Result<()> {
    OutputFormatter::info(&format!("Restoring files sorted into {}", output.display()));
    let outcome = RestoreEngine::restore(output)
        .with_context(|| format!("Could not restore {}", output.display()))?;

    let summary = restore_summary(&outcome);
    match &outcome {
        RestoreOutcome::NothingToRestore => OutputFormatter::info(&summary),
        RestoreOutcome::Completed(report) if report.is_complete_success() => {
            OutputFormatter::success(&summary)
        }
        RestoreOutcome::Completed(report) => {
            for (path, reason) in report.skipped_files.iter().chain(&report.failed_restores) {
                OutputFormatter::error(&format!("{}: {}", path.display(), reason));
            }
            OutputFormatter::warning(&summary);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MoveLedger;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_sort_then_restore_commands() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let input = temp_dir.path().join("in");
        let output = temp_dir.path().join("out");
        fs::create_dir_all(&input).expect("mkdir");
        let photo = input.join("IMG_20230401_153000.jpg");
        fs::write(&photo, "x").expect("write");

        let shutdown = Arc::new(AtomicBool::new(false));
        run_cli(
            Command::Sort {
                input: input.clone(),
                output: output.clone(),
                config: None,
                overrides: Overrides::default(),
            },
            Arc::clone(&shutdown),
        )
        .expect("sort");
        assert!(output.join("2023/04/2023_04_01_153000.jpg").exists());

        run_cli(
            Command::Restore {
                output: output.clone(),
            },
            shutdown,
        )
        .expect("restore");
        assert!(photo.exists());
        assert!(!MoveLedger::path_for(&output).exists());
    }

    #[test]
    fn test_invalid_override_is_reported_before_sorting() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let input = temp_dir.path().join("in");
        fs::create_dir_all(&input).expect("mkdir");
        fs::write(input.join("IMG_20230401_153000.jpg"), "x").expect("write");

        let result = run_cli(
            Command::Sort {
                input: input.clone(),
                output: temp_dir.path().join("out"),
                config: None,
                overrides: Overrides {
                    min_size_mb: Some(-1.0),
                    ..Overrides::default()
                },
            },
            Arc::new(AtomicBool::new(false)),
        );

        assert!(result.is_err());
        assert!(input.join("IMG_20230401_153000.jpg").exists());
        assert!(!temp_dir.path().join("out").exists());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = run_cli(
            Command::Sort {
                input: temp_dir.path().to_path_buf(),
                output: temp_dir.path().join("out"),
                config: Some(temp_dir.path().join("nope.toml")),
                overrides: Overrides::default(),
            },
            Arc::new(AtomicBool::new(false)),
        );
        assert!(result.is_err());
    }
}
