use futures_util::stream::{self, StreamExt, TryStreamExt};
use layerindex_common::diagnostic::Error;
use layerindex_common::Result;
use layerindex_domain::image::{ImageKey, ImageMetadata, ImageReference, MetadataIndex};
use layerindex_domain::registry::RegistrySource;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Turns registry manifests into [`MetadataIndex`] entries.
///
/// Every mode is all-or-nothing: the first failed call discards everything
/// gathered so far.
pub struct Aggregator<'a, R: RegistrySource + ?Sized> {
    registry: &'a R,
    concurrency: usize,
}

impl<'a, R: RegistrySource + ?Sized> Aggregator<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self {
            registry,
            concurrency: 1,
        }
    }

    /// Manifest fetches allowed in flight during [`crawl`](Self::crawl).
    /// `1` keeps the crawl strictly sequential.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn describe(&self, repository: &str, reference: &ImageReference) -> Result<(ImageKey, ImageMetadata)> {
        let manifest = self.registry.fetch_manifest(repository, &reference.tag).await?;
        debug!(image = %reference, layers = manifest.layers.len(), "Fetched manifest");
        let metadata = ImageMetadata::new(reference, &manifest.config_digest, manifest.layers);
        Ok((reference.key(), metadata))
    }

    pub async fn single(&self, reference: &ImageReference) -> Result<MetadataIndex> {
        let entry = self.describe(&reference.repository_path(), reference).await?;
        Ok(MetadataIndex::from_iter([entry]))
    }

    pub async fn list(&self, references: &[ImageReference]) -> Result<MetadataIndex> {
        let mut index = MetadataIndex::new();
        for reference in references {
            let (key, metadata) = self.describe(&reference.repository_path(), reference).await?;
            index.insert(key, metadata);
        }
        Ok(index)
    }

    /// Every tag of every repository in the registry.
    pub async fn crawl(&self) -> Result<MetadataIndex> {
        let started = Instant::now();

        let repositories = self.registry.list_repositories().await?;
        let mut targets = Vec::new();
        for repository in &repositories {
            for tag in self.registry.list_tags(repository).await? {
                let reference = ImageReference::from_repository(repository, &tag).map_err(Error::new)?;
                targets.push((repository.clone(), reference));
            }
        }

        let total = targets.len();
        let entries: Vec<(ImageKey, ImageMetadata)> = stream::iter(targets)
            .map(|(repository, reference)| async move { self.describe(&repository, &reference).await })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut index = MetadataIndex::new();
        for (key, metadata) in entries {
            if let Some(previous) = index.insert(key.clone(), metadata) {
                warn!(key = %key, replaced = %previous.name, "Two repositories map to the same image key");
            }
        }

        info!(
            repositories = repositories.len(),
            manifests = total,
            images = index.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Registry crawl finished"
        );
        Ok(index)
    }
}
