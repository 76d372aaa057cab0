use super::MetadataIndex;
use crate::Result;
use async_trait::async_trait;
use layerindex_common::diagnostic::Diagnosable;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot not found: {0}")]
    Missing(String),
    #[error("Snapshot {path} could not be decoded: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("Failed to persist snapshot {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SnapshotError {
    pub const MISSING: &'static str = "CACHE_MISSING";
    pub const CORRUPT: &'static str = "CACHE_CORRUPT";
    pub const PERSIST: &'static str = "CACHE_PERSIST_FAILED";
}

impl Diagnosable for SnapshotError {
    fn code(&self) -> String {
        match self {
            Self::Missing(_) => Self::MISSING.to_string(),
            Self::Corrupt { .. } => Self::CORRUPT.to_string(),
            Self::Persist { .. } => Self::PERSIST.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Self::Missing(_) => Some("The snapshot is written after the first successful crawl".to_string()),
            Self::Corrupt { .. } => Some("Delete the snapshot file; it is rebuilt on the next crawl".to_string()),
            Self::Persist { .. } => Some("Check disk space and permissions on the snapshot directory".to_string()),
        }
    }
}

/// Durable home of the last good [`MetadataIndex`].
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<MetadataIndex>;
    async fn save(&self, index: &MetadataIndex) -> Result<()>;
    async fn exists(&self) -> bool;
    /// Human-readable location, for logs.
    fn location(&self) -> String;
}
