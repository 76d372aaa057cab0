use layerindex_common::diagnostic::Diagnosable;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to authenticate with registry: {0}")]
    AuthenticationFailed(String),
    #[error("Not found in registry: {0}")]
    NotFound(String),
    #[error("Failed to decode registry response: {0}")]
    Decode(String),
    #[error("Invalid registry url: {0}")]
    InvalidUrl(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl RegistryError {
    pub const UNAVAILABLE: &'static str = "REG_UNAVAILABLE";
    pub const AUTH_FAILED: &'static str = "REG_AUTH_FAILED";
    pub const NOT_FOUND: &'static str = "REG_NOT_FOUND";
    pub const DECODE_FAILED: &'static str = "REG_DECODE_FAILED";
    pub const INVALID_URL: &'static str = "REG_INVALID_URL";
}

impl Diagnosable for RegistryError {
    fn code(&self) -> String {
        match self {
            // Timeouts and refused connections surface as transport errors.
            Self::Unavailable(_) | Self::Network(_) => Self::UNAVAILABLE,
            Self::AuthenticationFailed(_) => Self::AUTH_FAILED,
            Self::NotFound(_) => Self::NOT_FOUND,
            Self::Decode(_) => Self::DECODE_FAILED,
            Self::InvalidUrl(_) => Self::INVALID_URL,
        }
        .to_string()
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Self::Unavailable(_) | Self::Network(_) => {
                Some("Check that the registry is reachable and healthy.".to_string())
            }
            Self::AuthenticationFailed(_) => Some("Check the configured registry username and password.".to_string()),
            Self::NotFound(_) => Some("The repository or tag might have been deleted. Check spelling.".to_string()),
            Self::InvalidUrl(_) => Some("Use a registry url like http://localhost:5000".to_string()),
            Self::Decode(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerindex_common::diagnostic::Error;

    #[test]
    fn test_codes_survive_wrapping() {
        let err = Error::new(RegistryError::NotFound("nginx:1".to_string()));
        assert_eq!(err.code(), RegistryError::NOT_FOUND);
        assert!(err.suggestion().is_some());

        let err = Error::new(RegistryError::Unavailable("timeout".to_string()));
        assert_eq!(err.code(), RegistryError::UNAVAILABLE);
    }
}
