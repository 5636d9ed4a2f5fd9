//! Upload naming, persistence and the on-disk image library

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::image_cache::ImageMetadataCache;
use crate::game::GameError;

/// Lower-case extensions accepted for uploads
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

const DEFAULT_STEM: &str = "upload";

/// Partition of the upload directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Maps,
    Scenes,
}

impl ImageKind {
    pub const ALL: [ImageKind; 2] = [ImageKind::Maps, ImageKind::Scenes];

    pub fn dir_name(self) -> &'static str {
        match self {
            ImageKind::Maps => "maps",
            ImageKind::Scenes => "scenes",
        }
    }

    fn unavailable_message(self) -> String {
        match self {
            ImageKind::Maps => "Selected map is not available anymore.".to_string(),
            ImageKind::Scenes => "Selected scene is not available anymore.".to_string(),
        }
    }
}

/// Final path component, treating both `/` and `\` as separators
fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

/// Split a base name into stem and lower-cased extension. A leading dot
/// does not start an extension.
fn split_extension(base: &str) -> (&str, Option<String>) {
    match base.rfind('.') {
        Some(dot) if !base[..dot].trim_start_matches('.').is_empty() => {
            (&base[..dot], Some(base[dot + 1..].to_lowercase()))
        }
        _ => (base, None),
    }
}

pub fn has_allowed_extension(filename: &str) -> bool {
    let (_, ext) = split_extension(base_name(filename));
    ext.is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        DEFAULT_STEM.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Picks safe, collision-free filenames inside one directory
#[derive(Debug, Clone)]
pub struct UploadNamer {
    dir: PathBuf,
}

impl UploadNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Any directory entry counts, including symlinks whose target is gone
    fn is_taken(&self, candidate: &str) -> bool {
        fs::symlink_metadata(self.dir.join(candidate)).is_ok()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sanitized name for `original` that does not exist yet in the target
    /// directory: `stem.ext`, then `stem(1).ext`, `stem(2).ext`, ...
    pub fn name_for(&self, original: &str) -> Result<String, GameError> {
        if original.is_empty() {
            return Err(GameError::Validation("No file selected.".to_string()));
        }

        let (stem, ext) = split_extension(base_name(original));
        let ext = match ext {
            Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => ext,
            _ => {
                return Err(GameError::Validation(
                    "Unsupported file type. Use png/jpg/jpeg/webp.".to_string(),
                ))
            }
        };
        let stem = sanitize_stem(stem);

        let mut candidate = format!("{stem}.{ext}");
        let mut counter = 1u32;
        while self.is_taken(&candidate) {
            candidate = format!("{stem}({counter}).{ext}");
            counter += 1;
        }
        Ok(candidate)
    }
}

/// One image available for reuse
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryItem {
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

/// Root upload directory with its `maps/` and `scenes/` partitions
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, kind: ImageKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    pub fn path(&self, kind: ImageKind, filename: &str) -> PathBuf {
        self.dir(kind).join(filename)
    }

    pub fn namer(&self, kind: ImageKind) -> UploadNamer {
        UploadNamer::new(self.dir(kind))
    }

    /// Create the upload root and every partition
    pub fn setup_dirs(&self) -> std::io::Result<()> {
        for kind in ImageKind::ALL {
            fs::create_dir_all(self.dir(kind))?;
        }
        Ok(())
    }

    /// Persist uploaded bytes under a fresh sanitized name and return it
    pub fn save(&self, kind: ImageKind, original: &str, data: &[u8]) -> Result<String, GameError> {
        let namer = self.namer(kind);
        loop {
            let name = namer.name_for(original)?;
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(namer.dir().join(&name));

            match file {
                Ok(mut file) => {
                    file.write_all(data)?;
                    info!(kind = kind.dir_name(), filename = %name, bytes = data.len(), "Upload stored");
                    return Ok(name);
                }
                // Lost a race for this name; pick the next free one
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Resolve a previously stored image by name. Only the final path
    /// component is used.
    pub fn resolve_existing(&self, kind: ImageKind, name: &str) -> Result<String, GameError> {
        let candidate = base_name(name.trim());
        if !has_allowed_extension(candidate) || !self.path(kind, candidate).is_file() {
            return Err(GameError::Validation(kind.unavailable_message()));
        }
        Ok(candidate.to_string())
    }

    /// Readable images in a partition, sorted by filename. Entries that are
    /// not files or cannot be decoded are skipped.
    pub fn library(&self, kind: ImageKind, cache: &ImageMetadataCache) -> Vec<LibraryItem> {
        let dir = self.dir(kind);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| has_allowed_extension(name))
            .collect();
        names.sort();

        names
            .into_iter()
            .filter_map(|filename| {
                let path = dir.join(&filename);
                if !path.is_file() {
                    return None;
                }
                match cache.dimensions(&path) {
                    Ok(size) => Some(LibraryItem {
                        filename,
                        width: size.width,
                        height: size.height,
                    }),
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable library image");
                        None
                    }
                }
            })
            .collect()
    }
}
