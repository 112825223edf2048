//! Common error types used throughout hugin.
//!
//! Only construction, configuration, and lifecycle problems surface as
//! errors. Fetch and parse failures degrade to per-job outcomes and never
//! reach the caller as an [`Error`].

/// Common error type for hugin.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A query was built with contradictory or insufficient fields.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The configuration could not be used.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The response cache failed to load or persist.
    #[error("Cache error: {0}")]
    Cache(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The session was cancelled before the query started.
    #[error("Session cancelled")]
    Cancelled,

    /// The session has already been cleaned up.
    #[error("Session closed")]
    Closed,

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new InvalidQuery error.
    pub fn invalid_query<S: Into<String>>(msg: S) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new Cache error.
    pub fn cache<S: Into<String>>(msg: S) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
