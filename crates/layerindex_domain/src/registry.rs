use crate::image::{Digest, LayerMetadata};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The parts of an image manifest the index cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSummary {
    pub config_digest: Digest,
    pub config_size_bytes: i64,
    pub layers: Vec<LayerMetadata>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCounts {
    pub repositories: usize,
    pub tags: usize,
}

impl RegistryCounts {
    pub fn new(repositories: usize, tags: usize) -> Self {
        Self { repositories, tags }
    }

    /// True when either count increased. Shrinking is never reported.
    pub fn grew_from(&self, previous: &RegistryCounts) -> bool {
        self.repositories > previous.repositories || self.tags > previous.tags
    }
}

#[async_trait]
pub trait RegistrySource: Send + Sync {
    async fn list_repositories(&self) -> Result<Vec<String>>;
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>>;
    async fn fetch_manifest(&self, repository: &str, tag: &str) -> Result<ManifestSummary>;

    /// One catalog call plus one tag listing per repository. The first
    /// failure aborts the whole count.
    async fn counts(&self) -> Result<RegistryCounts> {
        let repositories = self.list_repositories().await?;
        let mut tags = 0;
        for repository in &repositories {
            tags += self.list_tags(repository).await?.len();
        }
        Ok(RegistryCounts::new(repositories.len(), tags))
    }
}
