//! Optional image downsampling before relocation.
//!
//! The transformer only produces bytes: it writes a re-encoded copy to a
//! staging path next to the final destination. Moving that artifact into
//! place is the mover's job.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Suffix appended to the final destination name for the staged artifact.
pub const STAGING_SUFFIX: &str = ".tmp";

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("cannot write {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("cannot create {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no image encoder for {0}")]
    UnknownFormat(PathBuf),
}

/// Size envelope and JPEG quality for optimized images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformSettings {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            quality: 85,
        }
    }
}

/// Resizes and re-encodes images into staging files.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaTransformer {
    settings: TransformSettings,
}

impl MediaTransformer {
    pub fn new(settings: TransformSettings) -> Self {
        Self { settings }
    }

    /// Staging path for a final destination: `<destination>.tmp`.
    pub fn staging_path(destination: &Path) -> PathBuf {
        let mut name = destination.as_os_str().to_os_string();
        name.push(STAGING_SUFFIX);
        PathBuf::from(name)
    }

    /// Writes a transformed copy of `source` for `destination` and returns the staged path.
    ///
    /// The output format follows the destination's extension. The image is
    /// shrunk to fit the envelope with its aspect ratio preserved, never enlarged.
    pub fn stage(&self, source: &Path, destination: &Path) -> Result<PathBuf, TransformError> {
        let format = ImageFormat::from_path(destination)
            .map_err(|_| TransformError::UnknownFormat(destination.to_path_buf()))?;
        let image = image::open(source).map_err(|e| TransformError::Decode {
            path: source.to_path_buf(),
            source: e,
        })?;
        let image = self.fit(image);

        let staged = Self::staging_path(destination);
        let encode_err = |e| TransformError::Encode {
            path: staged.clone(),
            source: e,
        };

        if format == ImageFormat::Jpeg {
            let file = File::create(&staged).map_err(|e| TransformError::Io {
                path: staged.clone(),
                source: e,
            })?;
            let mut writer = BufWriter::new(file);
            let encoder = JpegEncoder::new_with_quality(&mut writer, self.settings.quality);
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(encode_err)?;
            writer.flush().map_err(|e| TransformError::Io {
                path: staged.clone(),
                source: e,
            })?;
        } else {
            image.save_with_format(&staged, format).map_err(encode_err)?;
        }

        info!(
            "Optimized {} ({}x{}) into {}",
            source.display(),
            image.width(),
            image.height(),
            staged.display()
        );
        Ok(staged)
    }

    fn fit(&self, image: DynamicImage) -> DynamicImage {
        let TransformSettings {
            max_width,
            max_height,
            ..
        } = self.settings;
        if image.width() <= max_width && image.height() <= max_height {
            image
        } else {
            image.resize(max_width, max_height, FilterType::Lanczos3)
        }
    }
}
