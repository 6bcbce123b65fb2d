//! Outcome tallies and the human-readable run summary.

use crate::mover::Outcome;
use crate::undo::{RestoreOutcome, RestoreReport};
use std::fmt;
use std::path::PathBuf;

/// Final counts for one sort run.
///
/// `total` counts files that were processed; it always equals the sum of the
/// four outcome counts. Files never started because the run was cancelled are
/// counted separately in `not_started`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub total: usize,
    pub moved: usize,
    pub placed_in_other: usize,
    pub filtered: usize,
    pub errors: usize,
    pub not_started: usize,
    pub dry_run: bool,
    pub csv_export: Option<PathBuf>,
}

impl Report {
    pub fn count(&self, outcome: Outcome) -> usize {
        match outcome {
            Outcome::Moved => self.moved,
            Outcome::PlacedInOther => self.placed_in_other,
            Outcome::Filtered => self.filtered,
            Outcome::Error => self.errors,
        }
    }

    pub fn was_cancelled(&self) -> bool {
        self.not_started > 0
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "Dry run: no files were modified.")?;
        }
        writeln!(f, "Total files scanned: {}", self.total)?;
        writeln!(f, "Files moved: {}", self.moved)?;
        writeln!(f, "Files in 'Others': {}", self.placed_in_other)?;
        writeln!(f, "Files filtered: {}", self.filtered)?;
        writeln!(f, "Errors: {}", self.errors)?;
        if self.not_started > 0 {
            writeln!(f, "Skipped (cancelled): {}", self.not_started)?;
        }
        if let Some(path) = &self.csv_export {
            writeln!(f, "EXIF data exported to: {}", path.display())?;
        }
        Ok(())
    }
}

/// Accumulates outcomes as units complete.
///
/// The sorter feeds it from a single thread in submission order, so no
/// locking is needed.
#[derive(Debug, Default)]
pub struct ReportAggregator {
    report: Report,
}

impl ReportAggregator {
    pub fn new(dry_run: bool) -> Self {
        Self {
            report: Report {
                dry_run,
                ..Report::default()
            },
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        self.report.total += 1;
        match outcome {
            Outcome::Moved => self.report.moved += 1,
            Outcome::PlacedInOther => self.report.placed_in_other += 1,
            Outcome::Filtered => self.report.filtered += 1,
            Outcome::Error => self.report.errors += 1,
        }
    }

    pub fn record_not_started(&mut self) {
        self.report.not_started += 1;
    }

    pub fn processed(&self) -> usize {
        self.report.total
    }

    pub fn finish(self) -> Report {
        self.report
    }
}

/// One-line summary of a restore request.
pub fn restore_summary(outcome: &RestoreOutcome) -> String {
    match outcome {
        RestoreOutcome::NothingToRestore => "Nothing to restore.".to_string(),
        RestoreOutcome::Completed(report) => restore_report_summary(report),
    }
}

fn restore_report_summary(report: &RestoreReport) -> String {
    if report.is_complete_success() {
        format!("All {} files restored successfully.", report.restored_files)
    } else {
        format!("Restore finished with {} errors.", report.error_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_equals_sum_of_outcomes() {
        let mut aggregator = ReportAggregator::new(false);
        for outcome in [
            Outcome::Moved,
            Outcome::Moved,
            Outcome::PlacedInOther,
            Outcome::Filtered,
            Outcome::Error,
        ] {
            aggregator.record(outcome);
        }
        aggregator.record_not_started();

        let report = aggregator.finish();
        assert_eq!(report.total, 5);
        assert_eq!(
            report.total,
            report.moved + report.placed_in_other + report.filtered + report.errors
        );
        assert_eq!(report.count(Outcome::Moved), 2);
        assert!(report.was_cancelled());
    }

    #[test]
    fn test_report_text() {
        let report = Report {
            total: 4,
            moved: 2,
            placed_in_other: 1,
            filtered: 1,
            errors: 0,
            ..Report::default()
        };
        let text = report.to_string();
        assert!(text.contains("Total files scanned: 4"));
        assert!(text.contains("Files moved: 2"));
        assert!(text.contains("Files in 'Others': 1"));
        assert!(text.contains("Errors: 0"));
        assert!(!text.contains("Dry run"));
        assert!(!text.contains("cancelled"));
    }

    #[test]
    fn test_dry_run_report_says_so() {
        let report = ReportAggregator::new(true).finish();
        assert!(report.to_string().starts_with("Dry run"));
    }

    #[test]
    fn test_restore_summaries() {
        assert_eq!(
            restore_summary(&RestoreOutcome::NothingToRestore),
            "Nothing to restore."
        );

        let ok = RestoreReport {
            restored_files: 3,
            ..RestoreReport::default()
        };
        assert_eq!(
            restore_summary(&RestoreOutcome::Completed(ok)),
            "All 3 files restored successfully."
        );

        let partial = RestoreReport {
            restored_files: 1,
            failed_restores: vec![(PathBuf::from("/a"), "denied".to_string())],
            skipped_files: vec![(PathBuf::from("/b"), "missing".to_string())],
        };
        assert_eq!(
            restore_summary(&RestoreOutcome::Completed(partial)),
            "Restore finished with 2 errors."
        );
    }
}
