//! Error types for seahelm

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Seahelm error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line that could not be split into a sentence
    #[error("Malformed sentence: {0}")]
    MalformedSentence(String),

    /// A field inside a recognized sentence failed to parse
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// A lock was poisoned by a panicking thread
    #[error("Mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// An operation did not finish in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
