//! ResumeChat error types

use thiserror::Error;

/// ResumeChat error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vector index or embedding service failed or timed out
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Ordinal or referential phrase with no resolvable antecedent
    #[error("Ambiguous reference: {0}")]
    AmbiguousReference(String),

    /// Language generation call failed
    #[error("Generation failure: {0}")]
    GenerationFailure(String),

    /// Intent classification call failed
    #[error("Classification failure: {0}")]
    ClassificationFailure(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error means the retrieval backends could not be reached
    pub fn is_retrieval_unavailable(&self) -> bool {
        matches!(self, Error::RetrievalUnavailable(_))
    }
}

/// Result type alias for ResumeChat operations
pub type Result<T> = std::result::Result<T, Error>;
