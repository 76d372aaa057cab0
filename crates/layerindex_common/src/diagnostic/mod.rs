/// A trait for errors that provide a diagnostic code and a suggestion for resolution.
pub trait Diagnosable: std::error::Error {
    /// A unique machine-readable code (e.g., "REG_NOT_FOUND").
    fn code(&self) -> String;

    /// A human-readable suggestion for how to fix the error.
    fn suggestion(&self) -> Option<String>;
}

#[derive(Debug, thiserror::Error)]
#[error("{message} (Code: {code})")]
pub struct Error {
    message: String,
    code: String,
    suggestion: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new<E>(error: E) -> Self
    where
        E: Diagnosable + Send + Sync + 'static,
    {
        Self {
            message: error.to_string(),
            code: error.code(),
            suggestion: error.suggestion(),
            source: Some(Box::new(error)),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    /// Returns the wrapped error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.source.as_ref().and_then(|s| s.downcast_ref::<E>())
    }
}
