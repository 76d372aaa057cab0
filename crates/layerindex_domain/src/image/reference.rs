use super::ImageKey;
use layerindex_common::diagnostic::Diagnosable;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("Invalid image reference: {0:?}")]
    Invalid(String),
}

impl Diagnosable for ReferenceError {
    fn code(&self) -> String {
        "REF_INVALID".to_string()
    }

    fn suggestion(&self) -> Option<String> {
        Some("Use the form [host/][namespace/]image[:tag]".to_string())
    }
}

/// A parsed image reference, reduced to the parts the index is keyed on.
///
/// Only the path segment directly in front of the image name is kept, so
/// `host:5000/a/b/nginx:1.0` and `b/nginx:1.0` name the same image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    pub repository_segment: String,
    pub image_name: String,
    pub tag: String,
}

impl ImageReference {
    /// Parses a reference as a consumer would write it, optionally prefixed by
    /// `http(s)://host/` or a bare registry host.
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ReferenceError::Invalid(raw.to_string()));
        }

        let mut segments: Vec<&str> = trimmed.split('/').collect();
        if segments[0].starts_with("http:") || segments[0].starts_with("https:") {
            // "https:", "", "<host>"
            let strip = segments.len().min(3);
            segments.drain(..strip);
        } else if segments.len() > 1 && is_host(segments[0]) {
            segments.remove(0);
        }

        Self::from_segments(raw, &segments)
    }

    /// Parses `[path/]image[:tag]` taking every segment literally, so a
    /// dotted namespace such as `my.team/app` is kept.
    pub fn parse_path(raw: &str) -> Result<Self, ReferenceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ReferenceError::Invalid(raw.to_string()));
        }
        let segments: Vec<&str> = trimmed.split('/').collect();
        Self::from_segments(raw, &segments)
    }

    /// Builds the reference for a repository path as listed by the registry
    /// catalog. Catalog paths never carry a host.
    pub fn from_repository(repository: &str, tag: &str) -> Result<Self, ReferenceError> {
        Self::parse_path(&format!("{}:{}", repository, tag))
    }

    fn from_segments(raw: &str, segments: &[&str]) -> Result<Self, ReferenceError> {
        let invalid = || ReferenceError::Invalid(raw.to_string());

        let (last, parents) = segments.split_last().ok_or_else(invalid)?;
        let (image_name, tag) = last.split_once(':').unwrap_or((*last, DEFAULT_TAG));
        if image_name.is_empty() || tag.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            repository_segment: parents.last().copied().unwrap_or_default().to_string(),
            image_name: image_name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// `[segment/]image`, the registry repository path this reference maps to.
    pub fn repository_path(&self) -> String {
        if self.repository_segment.is_empty() {
            self.image_name.clone()
        } else {
            format!("{}/{}", self.repository_segment, self.image_name)
        }
    }

    /// `[segment/]image:tag`, never including a registry host.
    pub fn name(&self) -> String {
        format!("{}:{}", self.repository_path(), self.tag)
    }

    /// `image:tag` with both host and namespace removed.
    pub fn name_without_repository(&self) -> String {
        format!("{}:{}", self.image_name, self.tag)
    }

    pub fn key(&self) -> ImageKey {
        ImageKey::from_reference(self)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}
