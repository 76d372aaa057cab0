use super::{Digest, ImageKey, ImageReference};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMetadata {
    #[serde(rename = "size")]
    pub size_bytes: i64,
    #[serde(rename = "layer")]
    pub digest: Digest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Config digest without its algorithm prefix.
    pub id: String,
    pub name: String,
    pub name_without_repo: String,
    pub tag: String,
    #[serde(rename = "total_size")]
    pub total_size_bytes: i64,
    /// Bottom-to-top, as listed in the manifest.
    #[serde(rename = "layer_metadata")]
    pub layers: Vec<LayerMetadata>,
}

impl ImageMetadata {
    pub fn new(reference: &ImageReference, config_digest: &Digest, layers: Vec<LayerMetadata>) -> Self {
        Self {
            id: config_digest.encoded().to_string(),
            name: reference.name(),
            name_without_repo: reference.name_without_repository(),
            tag: reference.tag.clone(),
            total_size_bytes: total_layer_size(&layers),
            layers,
        }
    }
}

pub fn total_layer_size(layers: &[LayerMetadata]) -> i64 {
    layers.iter().map(|l| l.size_bytes).sum()
}

/// Snapshot of everything known about the registry, keyed by [`ImageKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataIndex {
    #[serde(rename = "images", default)]
    entries: BTreeMap<ImageKey, ImageMetadata>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry previously stored under `key`, if any.
    pub fn insert(&mut self, key: ImageKey, metadata: ImageMetadata) -> Option<ImageMetadata> {
        self.entries.insert(key, metadata)
    }

    pub fn get(&self, key: &ImageKey) -> Option<&ImageMetadata> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ImageKey, &ImageMetadata)> {
        self.entries.iter()
    }

    /// Every layer of every image. Shared base layers show up once per image.
    pub fn layers(&self) -> impl Iterator<Item = &LayerMetadata> {
        self.entries.values().flat_map(|m| m.layers.iter())
    }

    pub fn find_layer(&self, digest: &str) -> Option<&LayerMetadata> {
        self.layers().find(|l| l.digest.as_str() == digest)
    }
}

impl FromIterator<(ImageKey, ImageMetadata)> for MetadataIndex {
    fn from_iter<I: IntoIterator<Item = (ImageKey, ImageMetadata)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
