//! Maps a capture date (or its absence) to a target directory and filename.
//!
//! Dated files land in `<output>/<year>/<MM>/<formatted name><.ext>`; undated
//! files keep their name and go to the `Others` bucket.

use crate::capture_date::CaptureDate;
use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, NaiveDate};
use std::fmt::Write;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directory name of the fallback bucket.
pub const OTHERS_DIR: &str = "Others";

/// Default filename pattern, in token form.
pub const DEFAULT_FILENAME_PATTERN: &str = "YYYY_MM_DD_HHmmss";

const TOKENS: [(&str, &str); 7] = [
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MM", "%m"),
    ("DD", "%d"),
    ("HH", "%H"),
    ("mm", "%M"),
    ("ss", "%S"),
];

/// A filename pattern compiled to a chrono format string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenamePattern {
    format: String,
}

impl FilenamePattern {
    /// Compiles a pattern.
    ///
    /// Token form (`YYYY_MM_DD_HHmmss`) is translated token by token; anything
    /// containing `%` is taken as a strftime string. Returns the reason on failure.
    pub fn parse(pattern: &str) -> Result<Self, String> {
        if pattern.trim().is_empty() {
            return Err("pattern is empty".to_string());
        }
        if pattern.contains(['/', '\\']) {
            return Err("pattern must not contain path separators".to_string());
        }

        let format = if pattern.contains('%') {
            pattern.to_string()
        } else {
            translate_tokens(pattern)
        };

        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            return Err(format!("'{}' is not a valid date format", format));
        }

        let mut sample = String::new();
        let sample_date = NaiveDate::from_ymd_opt(2023, 12, 31)
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .ok_or_else(|| "cannot build sample date".to_string())?;
        if write!(sample, "{}", sample_date.format(&format)).is_err() {
            return Err(format!("'{}' needs information a capture date lacks", format));
        }
        if sample.trim().is_empty() || sample == "." || sample == ".." {
            return Err(format!("'{}' produces an empty file name", format));
        }
        if sample.contains(['/', '\\']) {
            return Err(format!("'{}' produces a path separator ({})", format, sample));
        }

        Ok(Self { format })
    }

    /// Formats `date` without an extension.
    pub fn format(&self, date: &CaptureDate) -> String {
        date.format(&self.format).to_string()
    }

    /// The chrono format string this pattern compiled to.
    pub fn as_strftime(&self) -> &str {
        &self.format
    }
}

impl Default for FilenamePattern {
    fn default() -> Self {
        Self {
            format: translate_tokens(DEFAULT_FILENAME_PATTERN),
        }
    }
}

fn translate_tokens(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for (token, spec) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Where a file should go, before collision resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub directory: PathBuf,
    pub file_name: String,
    /// True when the directory was derived from a capture date.
    pub dated: bool,
}

impl Destination {
    pub fn candidate_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Computes destinations under an output root.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    output_root: PathBuf,
    pattern: FilenamePattern,
}

impl PathClassifier {
    pub fn new(output_root: impl Into<PathBuf>, pattern: FilenamePattern) -> Self {
        Self {
            output_root: output_root.into(),
            pattern,
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Computes the destination for `source` given its resolved date.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use snapsort::classifier::{FilenamePattern, PathClassifier};
    /// use std::path::Path;
    ///
    /// let classifier = PathClassifier::new("/out", FilenamePattern::default());
    /// let date = NaiveDate::from_ymd_opt(2023, 4, 1).unwrap().and_hms_opt(15, 30, 0).unwrap();
    /// let dest = classifier.classify(Path::new("/in/IMG_20230401_153000.jpg"), Some(&date));
    /// assert_eq!(dest.candidate_path(), Path::new("/out/2023/04/2023_04_01_153000.jpg"));
    /// ```
    pub fn classify(&self, source: &Path, date: Option<&CaptureDate>) -> Destination {
        let original_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match date {
            Some(date) => {
                let directory = self
                    .output_root
                    .join(date.year().to_string())
                    .join(format!("{:02}", date.month()));
                let stem = self.pattern.format(date);
                let file_name = match source.extension() {
                    Some(ext) => format!("{}.{}", stem, ext.to_string_lossy()),
                    None => stem,
                };
                Destination {
                    directory,
                    file_name,
                    dated: true,
                }
            }
            None => Destination {
                directory: self.output_root.join(OTHERS_DIR),
                file_name: original_name,
                dated: false,
            },
        }
    }

    /// Creates the destination directory unless this is a dry run.
    ///
    /// Creating a directory that already exists (including one created
    /// concurrently by another worker) is not an error.
    pub fn prepare_directory(&self, destination: &Destination, dry_run: bool) -> io::Result<()> {
        if dry_run {
            return Ok(());
        }
        fs::create_dir_all(&destination.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> CaptureDate {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(h, min, s))
            .expect("valid date")
    }

    #[test]
    fn test_default_pattern_format() {
        let pattern = FilenamePattern::default();
        assert_eq!(pattern.as_strftime(), "%Y_%m_%d_%H%M%S");
        assert_eq!(pattern.format(&date(2023, 4, 1, 15, 30, 0)), "2023_04_01_153000");
    }

    #[test]
    fn test_token_pattern_translation() {
        let pattern = FilenamePattern::parse("YY-MM-DD HH.mm.ss photo").expect("valid");
        assert_eq!(pattern.as_strftime(), "%y-%m-%d %H.%M.%S photo");
    }

    #[test]
    fn test_strftime_pattern_passthrough() {
        let pattern = FilenamePattern::parse("%Y%m%d-%H%M%S").expect("valid");
        assert_eq!(pattern.format(&date(2020, 12, 31, 1, 2, 3)), "20201231-010203");
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(FilenamePattern::parse("").is_err());
        assert!(FilenamePattern::parse("YYYY/MM").is_err());
        assert!(FilenamePattern::parse("%Y_%Q").is_err());
    }

    #[test]
    fn test_patterns_expanding_to_separators_rejected() {
        for pattern in ["%D", "%x", "%m/%d", "%Y-%m-%d %Z", "%n"] {
            assert!(
                FilenamePattern::parse(pattern).is_err(),
                "{} should be rejected",
                pattern
            );
        }
        assert!(FilenamePattern::parse("%Y%m%d_%H%M%S").is_ok());
    }

    #[test]
    fn test_classify_dated_file() {
        let classifier = PathClassifier::new("/out", FilenamePattern::default());
        let dest = classifier.classify(
            Path::new("/in/sub/IMG_20230401_153000.JPG"),
            Some(&date(2023, 4, 1, 15, 30, 0)),
        );
        assert_eq!(dest.directory, PathBuf::from("/out/2023/04"));
        assert_eq!(dest.file_name, "2023_04_01_153000.JPG");
        assert!(dest.dated);
    }

    #[test]
    fn test_classify_dated_file_without_extension() {
        let classifier = PathClassifier::new("/out", FilenamePattern::default());
        let dest = classifier.classify(Path::new("/in/clip"), Some(&date(2019, 11, 5, 8, 0, 0)));
        assert_eq!(dest.candidate_path(), PathBuf::from("/out/2019/11/2019_11_05_080000"));
    }

    #[test]
    fn test_classify_undated_file() {
        let classifier = PathClassifier::new("/out", FilenamePattern::default());
        let dest = classifier.classify(Path::new("/in/random_notes.txt"), None);
        assert_eq!(dest.candidate_path(), PathBuf::from("/out/Others/random_notes.txt"));
        assert!(!dest.dated);
    }

    #[test]
    fn test_prepare_directory_dry_run_creates_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let classifier = PathClassifier::new(temp_dir.path(), FilenamePattern::default());
        let dest = classifier.classify(Path::new("a.jpg"), Some(&date(2023, 4, 1, 0, 0, 0)));

        classifier.prepare_directory(&dest, true).expect("dry run");
        assert!(!dest.directory.exists());

        classifier.prepare_directory(&dest, false).expect("create");
        classifier.prepare_directory(&dest, false).expect("idempotent");
        assert!(dest.directory.is_dir());
    }
}
