//! Sort configuration.
//!
//! This module loads run options from TOML configuration files, merges
//! command-line overrides, and validates everything up front. A raw
//! [`SortConfig`] is compiled into [`SortSettings`]; any invalid value is
//! reported as a [`ConfigError`] before a single file is touched.
//!
//! # Configuration File Format
//!
//! ```toml
//! [sort]
//! filename_pattern = "YYYY_MM_DD_HHmmss"
//! dry_run = false
//! min_size_mb = 0.0
//! min_resolution = "1024x768"
//! export_csv = false
//! optimize_images = false
//! workers = 4
//!
//! [types]
//! restrict = true
//! images = ["jpg", "jpeg", "png", "tiff", "bmp", "gif"]
//! videos = ["mp4", "mov", "avi"]
//!
//! [optimize]
//! max_width = 1920
//! max_height = 1080
//! quality = 85
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*/cache/*"]
//! ```

use crate::classifier::{DEFAULT_FILENAME_PATTERN, FilenamePattern};
use crate::file_filter::{
    DEFAULT_IMAGE_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS, FileFilter, Resolution, TypeAllowlist,
};
use crate::transform::TransformSettings;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".snapsortrc.toml";

/// Default size of the worker pool.
pub const DEFAULT_WORKERS: usize = 4;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),
    /// Minimum size is negative or not a number.
    #[error("Invalid minimum size {0}: expected a number of megabytes >= 0")]
    InvalidMinSize(f64),
    /// Resolution string is not `WIDTHxHEIGHT`.
    #[error("Invalid minimum resolution '{0}': expected WIDTHxHEIGHT, e.g. 1920x1080")]
    InvalidResolution(String),
    /// Filename pattern cannot be used.
    #[error("Invalid filename pattern '{pattern}': {reason}")]
    InvalidFilenamePattern { pattern: String, reason: String },
    /// Worker count is zero.
    #[error("Worker count must be at least 1")]
    InvalidWorkerCount,
    /// Transform settings are out of range.
    #[error("Invalid optimize settings: {0}")]
    InvalidOptimizeSettings(String),
}

/// Raw configuration as read from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    pub sort: SortOptions,
    pub types: TypeRules,
    pub optimize: OptimizeOptions,
    pub filters: FilterRules,
}

/// `[sort]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SortOptions {
    pub filename_pattern: String,
    pub dry_run: bool,
    pub min_size_mb: f64,
    /// `WIDTHxHEIGHT`; absent, empty, `none` or `no filter` disables the check.
    pub min_resolution: Option<String>,
    pub export_csv: bool,
    pub optimize_images: bool,
    pub workers: usize,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            filename_pattern: DEFAULT_FILENAME_PATTERN.to_string(),
            dry_run: false,
            min_size_mb: 0.0,
            min_resolution: None,
            export_csv: false,
            optimize_images: false,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// `[types]` section: the supported-type allowlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeRules {
    /// When false, every extension is accepted.
    pub restrict: bool,
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

impl Default for TypeRules {
    fn default() -> Self {
        Self {
            restrict: true,
            images: DEFAULT_IMAGE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            videos: DEFAULT_VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// `[optimize]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        let defaults = TransformSettings::default();
        Self {
            max_width: defaults.max_width,
            max_height: defaults.max_height,
            quality: defaults.quality,
        }
    }
}

/// `[filters]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    pub exclude: ExcludeRules,
}

/// Files that are never sorted. Excluded files are tallied as filtered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    pub filenames: Vec<String>,
    /// Glob patterns matched against the full path.
    pub patterns: Vec<String>,
}

impl Default for ExcludeRules {
    fn default() -> Self {
        Self {
            filenames: vec![".DS_Store".to_string(), "Thumbs.db".to_string()],
            patterns: Vec::new(),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub filename_pattern: Option<String>,
    pub dry_run: bool,
    pub min_size_mb: Option<f64>,
    pub min_resolution: Option<String>,
    pub export_csv: bool,
    pub optimize_images: bool,
    pub workers: Option<usize>,
    pub all_types: bool,
}

impl SortConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.snapsortrc.toml` in the current directory
    /// 3. Look for `~/.config/snapsort/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("snapsort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Applies command-line overrides. Boolean flags can only switch options on.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(pattern) = &overrides.filename_pattern {
            self.sort.filename_pattern = pattern.clone();
        }
        if let Some(min_size) = overrides.min_size_mb {
            self.sort.min_size_mb = min_size;
        }
        if let Some(resolution) = &overrides.min_resolution {
            self.sort.min_resolution = Some(resolution.clone());
        }
        if let Some(workers) = overrides.workers {
            self.sort.workers = workers;
        }
        self.sort.dry_run |= overrides.dry_run;
        self.sort.export_csv |= overrides.export_csv;
        self.sort.optimize_images |= overrides.optimize_images;
        if overrides.all_types {
            self.types.restrict = false;
        }
        self
    }

    /// Validates and compiles the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn compile(self) -> Result<SortSettings, ConfigError> {
        let SortOptions {
            filename_pattern,
            dry_run,
            min_size_mb,
            min_resolution,
            export_csv,
            optimize_images,
            workers,
        } = self.sort;

        if !min_size_mb.is_finite() || min_size_mb < 0.0 {
            return Err(ConfigError::InvalidMinSize(min_size_mb));
        }
        let min_resolution = parse_min_resolution(min_resolution.as_deref())?;
        let pattern = FilenamePattern::parse(&filename_pattern).map_err(|reason| {
            ConfigError::InvalidFilenamePattern {
                pattern: filename_pattern.clone(),
                reason,
            }
        })?;
        if workers == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }

        let optimize = if optimize_images {
            Some(validate_optimize(&self.optimize)?)
        } else {
            None
        };

        let allowlist = TypeAllowlist::new(&self.types.images, &self.types.videos, self.types.restrict);

        Ok(SortSettings {
            pattern,
            dry_run,
            filter: FileFilter::new(min_size_mb, min_resolution, allowlist),
            exclusions: CompiledExclusions::new(self.filters.exclude)?,
            export_csv,
            optimize,
            workers,
        })
    }
}

fn parse_min_resolution(raw: Option<&str>) -> Result<Option<Resolution>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("none")
        || trimmed.eq_ignore_ascii_case("no filter")
    {
        return Ok(None);
    }
    Resolution::parse(trimmed)
        .map(Some)
        .ok_or_else(|| ConfigError::InvalidResolution(raw.to_string()))
}

fn validate_optimize(options: &OptimizeOptions) -> Result<TransformSettings, ConfigError> {
    if options.max_width == 0 || options.max_height == 0 {
        return Err(ConfigError::InvalidOptimizeSettings(
            "max_width and max_height must be positive".to_string(),
        ));
    }
    if !(1..=100).contains(&options.quality) {
        return Err(ConfigError::InvalidOptimizeSettings(format!(
            "quality {} is outside 1..=100",
            options.quality
        )));
    }
    Ok(TransformSettings {
        max_width: options.max_width,
        max_height: options.max_height,
        quality: options.quality,
    })
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct SortSettings {
    pub pattern: FilenamePattern,
    pub dry_run: bool,
    pub filter: FileFilter,
    pub exclusions: CompiledExclusions,
    pub export_csv: bool,
    /// Present when images should be optimized before moving.
    pub optimize: Option<TransformSettings>,
    pub workers: usize,
}

impl Default for SortSettings {
    fn default() -> Self {
        Self {
            pattern: FilenamePattern::default(),
            dry_run: false,
            filter: FileFilter::new(0.0, None, TypeAllowlist::default()),
            exclusions: CompiledExclusions::default(),
            export_csv: false,
            optimize: None,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Compiled exclusion rules.
#[derive(Debug, Clone, Default)]
pub struct CompiledExclusions {
    filenames: HashSet<String>,
    patterns: Vec<Pattern>,
}

impl CompiledExclusions {
    fn new(rules: ExcludeRules) -> Result<Self, ConfigError> {
        let patterns = rules
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            filenames: rules.filenames.into_iter().collect(),
            patterns,
        })
    }

    /// Whether `path` matches an exclusion rule.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let by_name = path
            .file_name()
            .is_some_and(|n| self.filenames.contains(n.to_string_lossy().as_ref()));
        by_name || self.patterns.iter().any(|p| p.matches_path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_compiles() {
        let settings = SortConfig::default().compile().expect("defaults are valid");
        assert!(!settings.dry_run);
        assert_eq!(settings.workers, DEFAULT_WORKERS);
        assert_eq!(settings.pattern, FilenamePattern::default());
        assert!(settings.optimize.is_none());
    }

    #[test]
    fn test_parse_full_toml() {
        let config = SortConfig::from_toml(
            r#"
            [sort]
            filename_pattern = "YYYYMMDD-HHmmss"
            dry_run = true
            min_size_mb = 1.5
            min_resolution = "800x600"
            workers = 2

            [types]
            images = ["jpg", "heic"]

            [filters.exclude]
            filenames = ["skip.jpg"]
            patterns = ["*/cache/*"]
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.sort.min_resolution.as_deref(), Some("800x600"));
        assert!(config.types.restrict);
        assert_eq!(config.types.videos.len(), DEFAULT_VIDEO_EXTENSIONS.len());

        let settings = config.compile().expect("valid");
        assert!(settings.dry_run);
        assert_eq!(settings.workers, 2);
        assert!(settings.exclusions.is_excluded(Path::new("/in/skip.jpg")));
        assert!(settings.exclusions.is_excluded(Path::new("/in/cache/a.jpg")));
        assert!(!settings.exclusions.is_excluded(Path::new("/in/a.jpg")));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = SortConfig::from_toml("[sort\nworkers = ");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_negative_min_size_rejected() {
        let mut config = SortConfig::default();
        config.sort.min_size_mb = -1.0;
        assert_eq!(config.compile().err(), Some(ConfigError::InvalidMinSize(-1.0)));
    }

    #[test]
    fn test_malformed_resolution_rejected() {
        let mut config = SortConfig::default();
        config.sort.min_resolution = Some("big".to_string());
        assert!(matches!(
            config.compile(),
            Err(ConfigError::InvalidResolution(_))
        ));
    }

    #[test]
    fn test_no_filter_resolution_accepted() {
        for value in ["", "none", "No Filter"] {
            let mut config = SortConfig::default();
            config.sort.min_resolution = Some(value.to_string());
            assert!(config.compile().is_ok(), "{:?} should disable the filter", value);
        }
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let mut config = SortConfig::default();
        config.sort.filename_pattern = "YYYY/MM".to_string();
        assert!(matches!(
            config.compile(),
            Err(ConfigError::InvalidFilenamePattern { .. })
        ));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = SortConfig::default();
        config.sort.workers = 0;
        assert_eq!(config.compile().err(), Some(ConfigError::InvalidWorkerCount));
    }

    #[test]
    fn test_optimize_quality_validated_only_when_enabled() {
        let mut config = SortConfig::default();
        config.optimize.quality = 0;
        assert!(config.clone().compile().is_ok());

        config.sort.optimize_images = true;
        assert!(matches!(
            config.compile(),
            Err(ConfigError::InvalidOptimizeSettings(_))
        ));
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let mut config = SortConfig::default();
        config.filters.exclude.patterns = vec!["[".to_string()];
        assert!(matches!(
            config.compile(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = SortConfig::default().with_overrides(&Overrides {
            filename_pattern: Some("%Y%m%d".to_string()),
            dry_run: true,
            min_size_mb: Some(2.0),
            min_resolution: Some("10x10".to_string()),
            export_csv: true,
            optimize_images: true,
            workers: Some(8),
            all_types: true,
        });
        assert_eq!(config.sort.filename_pattern, "%Y%m%d");
        assert!(config.sort.dry_run);
        assert_eq!(config.sort.min_size_mb, 2.0);
        assert_eq!(config.sort.workers, 8);
        assert!(config.sort.export_csv);
        assert!(config.sort.optimize_images);
        assert!(!config.types.restrict);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "[sort]\nworkers = 3").expect("write");

        let config = SortConfig::load(Some(file.path())).expect("load");
        assert_eq!(config.sort.workers, 3);
        assert_eq!(config.sort.filename_pattern, DEFAULT_FILENAME_PATTERN);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = SortConfig::load(Some(Path::new("/no/such/snapsort.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }
}
