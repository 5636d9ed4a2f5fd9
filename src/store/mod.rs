//! Filesystem-backed stores: uploaded images and their metadata

pub mod image_cache;
pub mod uploads;

pub use image_cache::{ImageError, ImageMetadataCache};
pub use uploads::{ImageKind, LibraryItem, UploadStore};
