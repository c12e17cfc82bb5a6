//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Why an asset could not be published.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Missing storage setting {0}")]
    MissingSetting(&'static str),

    #[error("Invalid storage setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("Upload of {key} failed: {message}")]
    UploadFailed { key: String, message: String },

    #[error("Upload timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage unreachable: {0}")]
    Unreachable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn invalid_setting(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            name,
            reason: reason.into(),
        }
    }

    pub fn upload_failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UploadFailed {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey(key.into())
    }
}
