//! Error taxonomy for collaborator queries.

/// Errors produced by the git collaborator and input parsing.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("git error: {0}")]
    GitError(String),

    #[error("parse error: {0}")]
    ParseError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
