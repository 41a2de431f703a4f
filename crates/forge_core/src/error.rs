//! Error types for forge_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for forge_core operations.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// Project with the given id or name was not found.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// Version with the given id was not found in a project's history.
    #[error("version not found: {0}")]
    VersionNotFound(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid workflow state transition.
    #[error("invalid state transition from {from} on {event}")]
    InvalidStateTransition {
        /// Source state
        from: String,
        /// Event that was rejected
        event: String,
    },

    /// The generation backend could not be reached or rejected the request.
    #[error("generation backend error: {0}")]
    Backend(String),

    /// The generation backend answered with an empty body.
    #[error("generation backend returned an empty response")]
    EmptyResponse,

    /// Generation backend credentials are missing.
    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Local store error.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// A workspace already exists at the given location.
    #[error("workspace already exists at {}", .0.display())]
    WorkspaceExists(PathBuf),

    /// No workspace exists at the given location.
    #[error("not an appforge workspace: {}", .0.display())]
    NotAWorkspace(PathBuf),
}

impl ForgeError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotAWorkspace(_) => Some("Run 'forge init' to create a workspace here."),
            Self::WorkspaceExists(_) => Some("Use the existing workspace or remove .forge/ first."),
            Self::ProjectNotFound(_) => Some("List known projects with 'forge project list'."),
            Self::VersionNotFound(_) => Some("List saved versions with 'forge versions list <project>'."),
            Self::MissingApiKey(_) => {
                Some("Export the API key, or set generation.api_key_env in .forge/config.toml.")
            }
            Self::InvalidStateTransition { .. } => {
                Some("Only a pending plan can be approved or rejected. Send a planning request first.")
            }
            Self::Persist(_) => Some("The store might be locked by another forge process."),
            _ => None,
        }
    }
}

/// Errors raised by the local persistence layer.
///
/// These never abort an in-memory operation; callers log them and carry on.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The underlying database rejected an operation.
    #[error("store error: {0}")]
    Database(String),

    /// Stored JSON could not be encoded or decoded.
    #[error("store encoding error: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        PersistError::Encoding(e.to_string())
    }
}

/// Convenience Result type for forge_core operations.
pub type Result<T> = std::result::Result<T, ForgeError>;
