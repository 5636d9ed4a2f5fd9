//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::SharedGame;
use crate::store::{ImageMetadataCache, UploadStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game: Arc<SharedGame>,
    pub uploads: UploadStore,
    pub images: Arc<ImageMetadataCache>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Upload partitions live under the configured root
        let uploads = UploadStore::new(config.upload_dir.clone());

        Self {
            config,
            game: Arc::new(SharedGame::new()),
            uploads,
            images: Arc::new(ImageMetadataCache::new()),
        }
    }
}
