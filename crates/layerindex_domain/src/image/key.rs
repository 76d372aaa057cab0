use super::{ImageReference, ReferenceError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The one key the metadata index is written and read with.
///
/// Only obtainable from an [`ImageReference`], so every producer and every
/// lookup goes through the same parse.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageKey(String);

impl ImageKey {
    pub(crate) fn from_reference(reference: &ImageReference) -> Self {
        Self(reference.name())
    }

    /// Key for a reference as a consumer writes it, registry host stripped.
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        ImageReference::parse(raw).map(|r| r.key())
    }

    /// Keys `raw` may have been stored under, most likely first.
    ///
    /// A leading `my.team/` reads as a registry host to [`parse`](Self::parse),
    /// but a catalog repository can use it as a namespace, so the literal
    /// reading follows when it differs.
    pub fn candidates(raw: &str) -> Result<Vec<Self>, ReferenceError> {
        let mut keys = vec![Self::parse(raw)?];
        if let Ok(literal) = ImageReference::parse_path(raw) {
            let literal = literal.key();
            if literal != keys[0] {
                keys.push(literal);
            }
        }
        Ok(keys)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ImageKey {
    type Error = ReferenceError;

    /// Stored keys are taken literally; no host is stripped on decode.
    fn try_from(value: String) -> Result<Self, Self::Error> {
        ImageReference::parse_path(&value).map(|r| r.key())
    }
}

impl From<ImageKey> for String {
    fn from(key: ImageKey) -> Self {
        key.0
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
