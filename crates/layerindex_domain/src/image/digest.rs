use crate::Result;
use layerindex_common::diagnostic::{Diagnosable, Error};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    #[error("Empty digest")]
    Empty,
}

impl DigestError {
    pub const INVALID: &'static str = "DIGEST_INVALID";
}

impl Diagnosable for DigestError {
    fn code(&self) -> String {
        Self::INVALID.to_string()
    }

    fn suggestion(&self) -> Option<String> {
        Some("Digests look like sha256:<hex>".to_string())
    }
}

/// Content-addressed identifier of a blob. Treated as opaque apart from the
/// optional `algorithm:` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest(String);

impl Digest {
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(Error::new(DigestError::Empty));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after the algorithm prefix.
    pub fn encoded(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, hex)| hex)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
