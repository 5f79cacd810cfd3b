use thiserror::Error;

/// Error type for transport and discovery operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No report arrived within the read timeout. Expected while idle.
    #[error("read timed out")]
    Timeout,
    /// The device went away or its node can no longer be read.
    #[error("device disconnected: {0}")]
    Disconnected(String),
    /// Any other backend failure.
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether a reader should stop after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Timeout)
    }
}

/// Convenient result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
