use async_trait::async_trait;
use layerindex_common::diagnostic::{Diagnosable, Error};
use layerindex_common::Result;
use layerindex_domain::image::{Digest, LayerMetadata};
use layerindex_domain::registry::{ManifestSummary, RegistrySource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
#[error("fake registry: {0}")]
pub struct FakeError(String);

impl Diagnosable for FakeError {
    fn code(&self) -> String {
        "REG_UNAVAILABLE".to_string()
    }
    fn suggestion(&self) -> Option<String> {
        None
    }
}

#[derive(Default)]
struct State {
    repositories: Vec<(String, Vec<String>)>,
    manifests: HashMap<(String, String), ManifestSummary>,
    broken_manifests: Vec<(String, String)>,
    counting_fails: bool,
}

/// In-memory registry that records how many manifests were fetched.
#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<State>,
    manifest_fetches: AtomicUsize,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_image(&self, repository: &str, tag: &str, layers: &[(&str, i64)]) {
        let mut state = self.state.lock().unwrap();
        match state.repositories.iter_mut().find(|(r, _)| r == repository) {
            Some((_, tags)) => tags.push(tag.to_string()),
            None => state
                .repositories
                .push((repository.to_string(), vec![tag.to_string()])),
        }

        let summary = ManifestSummary {
            config_digest: Digest::new(format!("sha256:cfg-{}-{}", repository, tag)).unwrap(),
            config_size_bytes: 1,
            layers: layers
                .iter()
                .map(|(digest, size)| LayerMetadata {
                    size_bytes: *size,
                    digest: Digest::new(*digest).unwrap(),
                })
                .collect(),
        };
        state
            .manifests
            .insert((repository.to_string(), tag.to_string()), summary);
    }

    pub fn fail_manifest(&self, repository: &str, tag: &str) {
        self.state
            .lock()
            .unwrap()
            .broken_manifests
            .push((repository.to_string(), tag.to_string()));
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().broken_manifests.clear();
    }

    pub fn set_counting_fails(&self, fails: bool) {
        self.state.lock().unwrap().counting_fails = fails;
    }

    pub fn manifest_fetches(&self) -> usize {
        self.manifest_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistrySource for FakeRegistry {
    async fn list_repositories(&self) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.counting_fails {
            return Err(Error::new(FakeError("catalog down".to_string())));
        }
        Ok(state.repositories.iter().map(|(r, _)| r.clone()).collect())
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        state
            .repositories
            .iter()
            .find(|(r, _)| r == repository)
            .map(|(_, tags)| tags.clone())
            .ok_or_else(|| Error::new(FakeError(format!("no repository {}", repository))))
    }

    async fn fetch_manifest(&self, repository: &str, tag: &str) -> Result<ManifestSummary> {
        self.manifest_fetches.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        let key = (repository.to_string(), tag.to_string());
        if state.broken_manifests.contains(&key) {
            return Err(Error::new(FakeError(format!("{}:{} broken", repository, tag))));
        }
        state
            .manifests
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::new(FakeError(format!("{}:{} not found", repository, tag))))
    }
}
