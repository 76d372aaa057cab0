use layerindex_common::diagnostic::{Diagnosable, Error};
use layerindex_common::Result;
use layerindex_domain::image::{ImageKey, ImageMetadata, LayerMetadata, MetadataIndex};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Image not in metadata cache: {0}")]
    NotFound(String),
}

impl CacheError {
    pub const NOT_FOUND: &'static str = "CACHE_NOT_FOUND";
}

impl Diagnosable for CacheError {
    fn code(&self) -> String {
        Self::NOT_FOUND.to_string()
    }

    fn suggestion(&self) -> Option<String> {
        Some("The image may have been pushed after the last refresh".to_string())
    }
}

/// The in-process view of the index that lookups are served from.
///
/// Writers swap in a complete [`MetadataIndex`]; readers take a cheap
/// [`Arc`] of whichever index is current, so a lookup never observes a
/// half-built refresh.
#[derive(Debug, Default)]
pub struct MetadataCache {
    current: RwLock<Arc<MetadataIndex>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(index: MetadataIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    pub fn snapshot(&self) -> Arc<MetadataIndex> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Installs `index` and returns it as now shared.
    pub fn replace(&self, index: MetadataIndex) -> Arc<MetadataIndex> {
        let next = Arc::new(index);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        next
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Looks up any spelling of a reference (`host/ns/name:tag`, `ns/name`, ...).
    pub fn search(&self, reference: &str) -> Result<ImageMetadata> {
        let keys = ImageKey::candidates(reference).map_err(Error::new)?;
        let snapshot = self.snapshot();
        keys.iter()
            .find_map(|key| snapshot.get(key).cloned())
            .ok_or_else(|| Error::new(CacheError::NotFound(keys[0].to_string())))
    }

    pub fn get(&self, key: &ImageKey) -> Result<ImageMetadata> {
        self.snapshot()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::new(CacheError::NotFound(key.to_string())))
    }

    /// Size of the first layer with this digest. `Some(0)` is a real empty layer.
    pub fn search_layer(&self, digest: &str) -> Option<i64> {
        self.snapshot().find_layer(digest).map(|l| l.size_bytes)
    }

    /// Every layer of every image, shared layers repeated once per image.
    pub fn all_known_layers(&self) -> Vec<LayerMetadata> {
        self.snapshot().layers().cloned().collect()
    }

    /// Every known layer once, in first-seen order.
    pub fn unique_layers(&self) -> Vec<LayerMetadata> {
        let snapshot = self.snapshot();
        let mut seen = HashSet::new();
        snapshot
            .layers()
            .filter(|l| seen.insert(l.digest.as_str()))
            .cloned()
            .collect()
    }
}
