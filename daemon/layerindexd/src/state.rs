use layerindex_sync::{MetadataCache, WatcherStatus};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<MetadataCache>,
    pub status: watch::Receiver<WatcherStatus>,
}

impl AppState {
    pub fn new(cache: Arc<MetadataCache>, status: watch::Receiver<WatcherStatus>) -> Self {
        Self { cache, status }
    }
}
