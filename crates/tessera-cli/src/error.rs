//! Error types for tessera-cli

use tessera_core::ErrorKind;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from tessera-core
    #[error(transparent)]
    Core(#[from] tessera_core::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Failed to write key listings
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Interactive prompt error
    #[error("Interactive prompt error: {0}")]
    Dialoguer(#[from] dialoguer::Error),

    /// Setup found invalid keys and was asked to fail on them
    #[error("{count} registration key(s) failed validation")]
    InvalidKeys { count: usize },

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Process exit code: 1 for failures of the registered configurations
    /// themselves, 2 for anything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(e) => match e.kind() {
                ErrorKind::Identity
                | ErrorKind::Registration
                | ErrorKind::Graph
                | ErrorKind::Validation
                | ErrorKind::Lookup => 1,
                ErrorKind::Internal => 2,
            },
            CliError::InvalidKeys { .. } => 1,
            CliError::Io(_)
            | CliError::Json(_)
            | CliError::Dialoguer(_)
            | CliError::User { .. } => 2,
        }
    }
}
