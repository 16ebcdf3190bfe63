use thiserror::Error;

/// Failure kinds a backend signals from construction or `execute`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Only infrastructure failures are worth retrying; everything else
    /// fails the same way on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
