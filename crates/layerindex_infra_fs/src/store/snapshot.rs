use async_trait::async_trait;
use layerindex_common::diagnostic::Error;
use layerindex_common::Result;
use layerindex_domain::image::store::{SnapshotError, SnapshotStore};
use layerindex_domain::image::MetadataIndex;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Keeps the index as one pretty-printed JSON document.
///
/// Writes go to a sibling `.tmp` file that is then renamed over the target,
/// so in-process readers never see half a file.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persist_error(&self, source: std::io::Error) -> Error {
        Error::new(SnapshotError::Persist {
            path: self.location(),
            source,
        })
    }
}

pub fn encode(index: &MetadataIndex) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    index.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn load(&self) -> Result<MetadataIndex> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::new(SnapshotError::Missing(self.location())));
            }
            Err(e) => {
                return Err(Error::new(SnapshotError::Corrupt {
                    path: self.location(),
                    reason: e.to_string(),
                }));
            }
        };

        let index: MetadataIndex = serde_json::from_slice(&data).map_err(|e| {
            Error::new(SnapshotError::Corrupt {
                path: self.location(),
                reason: e.to_string(),
            })
        })?;

        info!(path = %self.path.display(), images = index.len(), "Loaded metadata snapshot");
        Ok(index)
    }

    async fn save(&self, index: &MetadataIndex) -> Result<()> {
        let data = encode(index).map_err(|e| self.persist_error(e.into()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| self.persist_error(e))?;
        }

        let tmp = self.temp_path();
        fs::write(&tmp, &data).await.map_err(|e| self.persist_error(e))?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(self.persist_error(e));
        }

        debug!(path = %self.path.display(), bytes = data.len(), images = index.len(), "Saved metadata snapshot");
        Ok(())
    }

    async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerindex_domain::image::{Digest, ImageMetadata, ImageReference, LayerMetadata};
    use tempfile::TempDir;

    fn sample_index() -> MetadataIndex {
        let mut index = MetadataIndex::new();
        for (raw, layers) in [
            ("myrepo/nginx:1.21", vec![("sha256:d1", 100), ("sha256:d2", 200)]),
            ("redis:7", vec![("sha256:d2", 200), ("sha256:d3", 0)]),
        ] {
            let r = ImageReference::parse(raw).unwrap();
            let layers = layers
                .into_iter()
                .map(|(d, size)| LayerMetadata {
                    size_bytes: size,
                    digest: Digest::new(d).unwrap(),
                })
                .collect();
            index.insert(r.key(), ImageMetadata::new(&r, &Digest::new("sha256:cfg").unwrap(), layers));
        }
        index
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(tmp.path().join("cache.json"));
        let index = sample_index();

        store.save(&index).await.unwrap();
        assert!(store.exists().await);
        assert_eq!(store.load().await.unwrap(), index);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let tmp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(tmp.path().join("nope.json"));
        assert!(!store.exists().await);
        let err = store.load().await.unwrap_err();
        assert_eq!(err.code(), SnapshotError::MISSING);
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        std::fs::write(&path, b"{\"images\": [").unwrap();
        let err = JsonSnapshotStore::new(&path).load().await.unwrap_err();
        assert_eq!(err.code(), SnapshotError::CORRUPT);
    }

    #[tokio::test]
    async fn test_creates_parent_dirs_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(tmp.path().join("a/b/cache.json"));

        store.save(&sample_index()).await.unwrap();
        store.save(&MetadataIndex::new()).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_output_is_stable_and_pretty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(tmp.path().join("cache.json"));

        store.save(&sample_index()).await.unwrap();
        let first = std::fs::read_to_string(store.path()).unwrap();
        store.save(&sample_index()).await.unwrap();
        let second = std::fs::read_to_string(store.path()).unwrap();

        assert_eq!(first, second);
        assert!(first.contains("\n    \"images\": {"));
        assert!(first.contains("\"name_without_repo\": \"nginx:1.21\""));
    }

    #[tokio::test]
    async fn test_unwritable_target_is_persist_failure() {
        let tmp = TempDir::new().unwrap();
        // A directory where the file should go makes the rename fail.
        let path = tmp.path().join("cache.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let err = JsonSnapshotStore::new(&path).save(&sample_index()).await.unwrap_err();
        assert_eq!(err.code(), SnapshotError::PERSIST);
    }
}
