//! Error types for Shelfsync Core

use thiserror::Error;

/// Result type alias using ShelfError
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Top-level error type for all Shelfsync operations
#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Remote catalog error: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    List(#[from] ListError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// The persistence backend could not complete an operation.
///
/// Never retried by the core; always surfaced to the caller.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported schema version {found} (this build supports up to {supported})")]
    SchemaVersion { found: i32, supported: i32 },
}

/// The remote catalog could not be reached or answered with something unusable.
///
/// The sync service recovers from every variant by reading the local cache.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Field-level validation failure for a list name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name must be at least {min} characters")]
    TooShort { min: usize },

    #[error("name cannot exceed {max} characters")]
    TooLong { max: usize },

    #[error("name may only contain letters, digits, spaces, hyphens and underscores")]
    InvalidCharacters,
}

/// Outcome of a list operation that did not succeed.
///
/// Everything except `Storage` is an expected business-rule result.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("Invalid list name: {0}")]
    Validation(#[from] NameError),

    #[error("You cannot create more than {max} lists")]
    ListLimitExceeded { max: usize },

    #[error("A list with that name already exists")]
    DuplicateName,

    #[error("This book is already in the list")]
    AlreadyInList,

    #[error("List not found: {0}")]
    ListNotFound(uuid::Uuid),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ListError {
    /// True for expected outcomes of normal use, false for storage failures.
    pub fn is_business_rule(&self) -> bool {
        !matches!(self, ListError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rule_classification() {
        assert!(ListError::DuplicateName.is_business_rule());
        assert!(ListError::Validation(NameError::InvalidCharacters).is_business_rule());
        assert!(ListError::ListLimitExceeded { max: 3 }.is_business_rule());
        assert!(!ListError::Storage(StorageError::Unavailable("gone".into())).is_business_rule());
    }

    #[test]
    fn test_name_error_messages() {
        assert_eq!(
            NameError::TooShort { min: 2 }.to_string(),
            "name must be at least 2 characters"
        );
        assert_eq!(
            ListError::ListLimitExceeded { max: 3 }.to_string(),
            "You cannot create more than 3 lists"
        );
    }
}
