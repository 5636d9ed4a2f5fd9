//! Image dimension lookup, cached by file modification time

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use dashmap::DashMap;
use tracing::debug;

use crate::game::MapSize;

/// Failure to read an image's dimensions
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Failed to read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {path}: {message}")]
    Decode { path: PathBuf, message: String },
}

impl ImageError {
    /// Message safe to show to the host
    pub fn user_message(&self) -> &'static str {
        "The selected image file appears to be corrupted or invalid."
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedSize {
    modified: SystemTime,
    size: MapSize,
}

/// Pixel dimensions per path. An entry is reused only while the file's
/// modification time is unchanged; entries are never evicted.
#[derive(Debug, Default)]
pub struct ImageMetadataCache {
    entries: DashMap<PathBuf, CachedSize>,
}

impl ImageMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimensions(&self, path: &Path) -> Result<MapSize, ImageError> {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|source| ImageError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(cached) = self.entries.get(path) {
            if cached.modified == modified {
                return Ok(cached.size);
            }
        }

        let io_error = |source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        };
        // Sniff the format from content; the extension alone is not trusted
        let (width, height) = image::ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(io_error)?
            .into_dimensions()
            .map_err(|e| match e {
                image::ImageError::IoError(source) => io_error(source),
                other => ImageError::Decode {
                    path: path.to_path_buf(),
                    message: other.to_string(),
                },
            })?;

        let size = MapSize::new(width, height);
        debug!(path = %path.display(), width, height, "Image dimensions decoded");
        self.entries
            .insert(path.to_path_buf(), CachedSize { modified, size });
        Ok(size)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
