//! Error types for deskcap.

use thiserror::Error;

/// Error kinds mirror the capture taxonomy: temporary failures are worth a
/// retry on the next tick, permanent ones are not. Platform error codes stay
/// in the message as diagnostic context only.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The operation failed but is expected to recover (OS rate limit, empty
    /// frame, transient display reconfiguration).
    #[error("temporary capture failure: {0}")]
    Temporary(String),

    /// The source can never produce frames again (window closed, handle
    /// invalidated, unsupported session).
    #[error("permanent capture failure: {0}")]
    Permanent(String),

    /// The requested configuration is not available on this system.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl CaptureError {
    pub fn temporary<S: Into<String>>(message: S) -> Self {
        Self::Temporary(message.into())
    }

    pub fn permanent<S: Into<String>>(message: S) -> Self {
        Self::Permanent(message.into())
    }

    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

/// Result type for deskcap operations.
pub type Result<T> = std::result::Result<T, CaptureError>;
