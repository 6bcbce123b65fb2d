//! Terminal output for the snapsort binary.
//!
//! Colored status lines, the progress bar shown during a sort, and the final
//! summary table. The library itself only logs; everything user-facing on
//! stdout goes through here.

use crate::report::Report;
use crate::sorter::{ProgressReporter, UnitResult};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Styled terminal output.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use snapsort::output::OutputFormatter;
    /// OutputFormatter::success("All 3 files restored successfully.");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red to stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for `total` files.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        let pb = ProgressBar::new(total);
        pb.set_style(style);
        pb
    }

    /// Prints the outcome counts of a sort run as a table.
    pub fn report_table(report: &Report) {
        Self::header("SUMMARY");

        let rows = [
            ("Moved", report.moved),
            ("Others", report.placed_in_other),
            ("Filtered", report.filtered),
            ("Errors", report.errors),
        ];
        let width = rows
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(0)
            .max("Outcome".len());

        println!(
            "{:<width$} | {}",
            "Outcome".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));
        for (label, count) in rows {
            let count = if label == "Errors" && count > 0 {
                count.to_string().red()
            } else {
                count.to_string().green()
            };
            println!("{:<width$} | {}", label, count, width = width);
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {}",
            "Total".bold(),
            report.total.to_string().green().bold(),
            width = width
        );

        if report.was_cancelled() {
            Self::warning(&format!(
                "Cancelled: {} files were not started",
                report.not_started
            ));
        }
        if let Some(path) = &report.csv_export {
            Self::info(&format!("EXIF data exported to: {}", path.display()));
        }
        if report.dry_run {
            Self::dry_run_notice("No files were modified.");
        }
    }
}

/// Drives an indicatif bar from sort progress.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            bar: OutputFormatter::create_progress_bar(0),
        }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarProgress {
    fn on_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_progress(&self, completed: usize, _total: usize) {
        self.bar.set_position(completed as u64);
    }

    fn on_unit(&self, result: &UnitResult) {
        if let Some(name) = result.source.file_name() {
            self.bar.set_message(name.to_string_lossy().into_owned());
        }
    }

    fn on_finish(&self) {
        self.bar.finish_and_clear();
    }
}
