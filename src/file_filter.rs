//! Accept/reject decisions made before a file is touched.
//!
//! A file is rejected when it is smaller than the minimum size, when it is an
//! image below the minimum resolution (or cannot be probed for one), or when
//! its extension is not on the supported-type allowlist.

use image::ImageReader;
use log::debug;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Default image extensions, lowercase and without the dot.
pub const DEFAULT_IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "tiff", "bmp", "gif"];

/// Default video extensions, lowercase and without the dot.
pub const DEFAULT_VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "mov", "avi"];

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Broad media kind, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

/// Minimum pixel dimensions, parsed from `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Parses `"1920x1080"` (the `x` is case-insensitive). Both sides must be positive.
    pub fn parse(input: &str) -> Option<Self> {
        let lower = input.trim().to_ascii_lowercase();
        let (w, h) = lower.split_once('x')?;
        let width = w.trim().parse::<u32>().ok().filter(|v| *v > 0)?;
        let height = h.trim().parse::<u32>().ok().filter(|v| *v > 0)?;
        Some(Self { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Supported extensions, split by kind.
#[derive(Debug, Clone)]
pub struct TypeAllowlist {
    images: HashSet<String>,
    videos: HashSet<String>,
    restrict: bool,
}

impl TypeAllowlist {
    pub fn new<I, V>(images: I, videos: V, restrict: bool) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        let normalize = |ext: &str| ext.trim_start_matches('.').to_lowercase();
        Self {
            images: images.into_iter().map(|e| normalize(e.as_ref())).collect(),
            videos: videos.into_iter().map(|e| normalize(e.as_ref())).collect(),
            restrict,
        }
    }

    /// Looks up the kind of `path` by its extension, case-insensitively.
    pub fn kind_of(&self, path: &Path) -> Option<MediaKind> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        if self.images.contains(&ext) {
            Some(MediaKind::Image)
        } else if self.videos.contains(&ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Whether `path` passes the allowlist. Always true when restriction is off.
    pub fn allows(&self, path: &Path) -> bool {
        !self.restrict || self.kind_of(path).is_some()
    }
}

impl Default for TypeAllowlist {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS, true)
    }
}

/// Why a file was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    TooSmall { size: u64, minimum: u64 },
    BelowResolution { found: Resolution, minimum: Resolution },
    Unprobeable(String),
    UnsupportedType,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooSmall { size, minimum } => {
                write!(f, "{} bytes is below the {} byte minimum", size, minimum)
            }
            Self::BelowResolution { found, minimum } => {
                write!(f, "resolution {} is below {}", found, minimum)
            }
            Self::Unprobeable(reason) => write!(f, "cannot read image dimensions: {}", reason),
            Self::UnsupportedType => write!(f, "unsupported file type"),
        }
    }
}

/// Size, resolution and type checks for one run.
#[derive(Debug, Clone)]
pub struct FileFilter {
    min_size_bytes: u64,
    min_resolution: Option<Resolution>,
    allowlist: TypeAllowlist,
}

impl FileFilter {
    /// `min_size_mb` is an inclusive lower bound in megabytes (1 MB = 1024 * 1024 bytes).
    pub fn new(min_size_mb: f64, min_resolution: Option<Resolution>, allowlist: TypeAllowlist) -> Self {
        Self {
            min_size_bytes: (min_size_mb.max(0.0) * BYTES_PER_MEGABYTE).ceil() as u64,
            min_resolution,
            allowlist,
        }
    }

    pub fn allowlist(&self) -> &TypeAllowlist {
        &self.allowlist
    }

    /// Checks `path` of `size` bytes. Returns `Ok(())` when the file may proceed.
    pub fn check(&self, path: &Path, size: u64) -> Result<(), Rejection> {
        if size < self.min_size_bytes {
            return Err(Rejection::TooSmall {
                size,
                minimum: self.min_size_bytes,
            });
        }

        if let Some(minimum) = self.min_resolution
            && self.allowlist.kind_of(path) == Some(MediaKind::Image)
        {
            let found = probe_dimensions(path).map_err(Rejection::Unprobeable)?;
            if found.width < minimum.width || found.height < minimum.height {
                return Err(Rejection::BelowResolution { found, minimum });
            }
        }

        if !self.allowlist.allows(path) {
            return Err(Rejection::UnsupportedType);
        }

        debug!("Accepted {}", path.display());
        Ok(())
    }
}

/// Reads pixel dimensions from the image header.
pub fn probe_dimensions(path: &Path) -> Result<Resolution, String> {
    let (width, height) = ImageReader::open(path)
        .map_err(|e| e.to_string())?
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())?;
    Ok(Resolution { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::fs;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::new(width, height).save(path).expect("write png");
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!(
            Resolution::parse("1920x1080"),
            Some(Resolution {
                width: 1920,
                height: 1080
            })
        );
        assert_eq!(
            Resolution::parse(" 640X480 "),
            Some(Resolution {
                width: 640,
                height: 480
            })
        );
        assert_eq!(Resolution::parse("1920"), None);
        assert_eq!(Resolution::parse("0x10"), None);
        assert_eq!(Resolution::parse("axb"), None);
    }

    #[test]
    fn test_allowlist_case_insensitive() {
        let allowlist = TypeAllowlist::default();
        assert_eq!(allowlist.kind_of(Path::new("a.JPG")), Some(MediaKind::Image));
        assert_eq!(allowlist.kind_of(Path::new("b.Mov")), Some(MediaKind::Video));
        assert_eq!(allowlist.kind_of(Path::new("c.txt")), None);
        assert_eq!(allowlist.kind_of(Path::new("noext")), None);
    }

    #[test]
    fn test_allowlist_normalizes_configured_extensions() {
        let allowlist = TypeAllowlist::new([".HEIC"], Vec::<String>::new(), true);
        assert_eq!(allowlist.kind_of(Path::new("x.heic")), Some(MediaKind::Image));
    }

    #[test]
    fn test_unrestricted_allowlist_accepts_anything() {
        let allowlist = TypeAllowlist::new(DEFAULT_IMAGE_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS, false);
        assert!(allowlist.allows(Path::new("notes.txt")));
    }

    #[test]
    fn test_min_size_rejects_smaller_files() {
        let filter = FileFilter::new(5.0, None, TypeAllowlist::default());
        let two_mb = 2 * 1024 * 1024;
        let five_mb = 5 * 1024 * 1024;

        assert!(matches!(
            filter.check(Path::new("IMG_20230401_153000.jpg"), two_mb),
            Err(Rejection::TooSmall { .. })
        ));
        assert!(filter.check(Path::new("IMG_20230401_153000.jpg"), five_mb).is_ok());
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let filter = FileFilter::new(0.0, None, TypeAllowlist::default());
        assert_eq!(
            filter.check(Path::new("random_notes.txt"), 10),
            Err(Rejection::UnsupportedType)
        );
    }

    #[test]
    fn test_min_resolution_checks_images() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let small = temp_dir.path().join("small.png");
        let large = temp_dir.path().join("large.png");
        write_png(&small, 40, 30);
        write_png(&large, 120, 90);

        let filter = FileFilter::new(0.0, Resolution::parse("100x80"), TypeAllowlist::default());
        assert!(matches!(
            filter.check(&small, 1),
            Err(Rejection::BelowResolution { .. })
        ));
        assert!(filter.check(&large, 1).is_ok());
    }

    #[test]
    fn test_unreadable_image_rejected_when_resolution_required() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let broken = temp_dir.path().join("broken.jpg");
        fs::write(&broken, "definitely not a jpeg").expect("write");

        let filter = FileFilter::new(0.0, Resolution::parse("10x10"), TypeAllowlist::default());
        assert!(matches!(
            filter.check(&broken, 21),
            Err(Rejection::Unprobeable(_))
        ));
    }

    #[test]
    fn test_videos_skip_resolution_probe() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let clip = temp_dir.path().join("VID_20230401_153000.mp4");
        fs::write(&clip, "not really a video").expect("write");

        let filter = FileFilter::new(0.0, Resolution::parse("10x10"), TypeAllowlist::default());
        assert!(filter.check(&clip, 18).is_ok());
    }
}
