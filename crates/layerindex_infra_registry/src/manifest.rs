use crate::error::RegistryError;
use layerindex_domain::image::{Digest, LayerMetadata};
use layerindex_domain::registry::ManifestSummary;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

pub const MANIFEST_ACCEPT: [&str; 4] = [DOCKER_MANIFEST_V2, DOCKER_MANIFEST_LIST, OCI_MANIFEST, OCI_INDEX];

/// GET /v2/_catalog
#[derive(Debug, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub repositories: Vec<String>,
}

/// GET /v2/<repo>/tags/list
#[derive(Debug, Deserialize)]
pub struct TagList {
    pub name: String,
    // Registries answer `null` for a repository whose tags were all deleted.
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestV2 {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: Option<String>,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: Option<String>,
    pub size: i64,
    pub digest: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestList {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: Option<String>,
    pub manifests: Vec<ManifestDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDescriptor {
    #[serde(default)]
    pub media_type: Option<String>,
    pub size: i64,
    pub digest: String,
    pub platform: Option<Platform>,
}

#[derive(Debug, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
    pub variant: Option<String>,
}

/// Either an image manifest or a multi-platform list pointing at several.
#[derive(Debug)]
pub enum ManifestDocument {
    Image(ManifestV2),
    List(ManifestList),
}

impl ManifestDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RegistryError> {
        #[derive(Deserialize)]
        struct Probe {
            manifests: Option<serde::de::IgnoredAny>,
        }

        let decode = |e: serde_json::Error| RegistryError::Decode(format!("manifest: {}", e));
        let probe: Probe = serde_json::from_slice(bytes).map_err(decode)?;
        if probe.manifests.is_some() {
            serde_json::from_slice(bytes).map(Self::List).map_err(decode)
        } else {
            serde_json::from_slice(bytes).map(Self::Image).map_err(decode)
        }
    }
}

impl ManifestV2 {
    pub fn summary(&self) -> Result<ManifestSummary, RegistryError> {
        let config_digest = descriptor_digest(&self.config)?;
        let layers = self
            .layers
            .iter()
            .map(|layer| {
                Ok(LayerMetadata {
                    size_bytes: layer.size,
                    digest: descriptor_digest(layer)?,
                })
            })
            .collect::<Result<Vec<_>, RegistryError>>()?;

        Ok(ManifestSummary {
            config_digest,
            config_size_bytes: self.config.size,
            layers,
        })
    }
}

fn descriptor_digest(descriptor: &Descriptor) -> Result<Digest, RegistryError> {
    if descriptor.size < 0 {
        return Err(RegistryError::Decode(format!(
            "negative size {} for {}",
            descriptor.size, descriptor.digest
        )));
    }
    Digest::new(descriptor.digest.as_str())
        .map_err(|_| RegistryError::Decode("descriptor without digest".to_string()))
}

impl ManifestList {
    pub fn select(&self, platform: &PlatformSelector) -> Option<&ManifestDescriptor> {
        self.manifests
            .iter()
            .find(|m| m.platform.as_ref().is_some_and(|p| platform.matches(p)))
    }
}

/// `os/arch[/variant]`, e.g. `linux/arm64/v8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSelector {
    pub os: String,
    pub architecture: String,
    pub variant: Option<String>,
}

impl PlatformSelector {
    pub fn matches(&self, platform: &Platform) -> bool {
        platform.os == self.os
            && platform.architecture == self.architecture
            && match &self.variant {
                Some(variant) => platform.variant.as_deref() == Some(variant.as_str()),
                None => true,
            }
    }
}

impl Default for PlatformSelector {
    fn default() -> Self {
        Self {
            os: "linux".to_string(),
            architecture: "amd64".to_string(),
            variant: None,
        }
    }
}

impl FromStr for PlatformSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [os, arch] if !os.is_empty() && !arch.is_empty() => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: None,
            }),
            [os, arch, variant] if !os.is_empty() && !arch.is_empty() && !variant.is_empty() => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: Some(variant.to_string()),
            }),
            _ => Err(format!("invalid platform {:?}, expected os/arch[/variant]", s)),
        }
    }
}

impl fmt::Display for PlatformSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}
