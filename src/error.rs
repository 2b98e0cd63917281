use thiserror::Error;

/// Store error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// The caller supplied a request the store can never accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced incident or association does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The underlying key/value backend failed or rejected an operation
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            StoreError::InvalidArgument(_) => "INVALID_ARGUMENT",
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            StoreError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Whether a caller may reasonably retry the failed operation
    pub fn is_retriable(&self) -> bool {
        matches!(self, StoreError::StorageUnavailable(_))
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for StoreError {
    fn from(err: config::ConfigError) -> Self {
        StoreError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;
