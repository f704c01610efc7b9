use thiserror::Error;

pub type Result<T> = std::result::Result<T, BracketError>;

/// Error taxonomy for the bracket engine. Every public operation returns
/// one of these; nothing panics across the crate boundary.
#[derive(Debug, Error)]
pub enum BracketError {
    /// Bad input detected before any mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing tournament or match.
    #[error("not found: {0}")]
    NotFound(String),

    /// Lost a race or hit an already-decided match.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Structural invariant violated (no downstream match, unresolvable
    /// final). Should not occur if generation invariants hold.
    #[error("bracket structure corrupted: {0}")]
    Cascade(String),

    /// A store write failed.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl BracketError {
    pub fn validation(message: impl Into<String>) -> BracketError {
        BracketError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> BracketError {
        BracketError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> BracketError {
        BracketError::Conflict(message.into())
    }

    pub fn cascade(message: impl Into<String>) -> BracketError {
        BracketError::Cascade(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> BracketError {
        BracketError::Persistence(message.into())
    }
}
