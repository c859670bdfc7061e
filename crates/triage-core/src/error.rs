//! Error types for ticket triage

/// Result type alias using the triage Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for triage operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Ticket data the classifier cannot work with (e.g. no text)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Network failures talking to the text-generation API or the audit store
    #[error("transport failure: {0}")]
    Transport(String),

    /// Model output that does not follow the expected field format
    #[error("unparsable model response: {0}")]
    UnparsableResponse(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Audit store errors
    #[error("store error: {0}")]
    Store(String),

    /// Timeout errors
    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new unparsable response error
    pub fn unparsable(msg: impl Into<String>) -> Self {
        Self::UnparsableResponse(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
