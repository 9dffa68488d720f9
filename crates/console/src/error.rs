use thiserror::Error;

/// Failure of a console operation, as shown to the operator.
///
/// Every variant is recoverable: fix the input (or the connection) and
/// retry the same operation in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    /// Detected locally before any request was sent.
    #[error("{0}")]
    Validation(String),

    /// The backend refused the request; the message is the backend's own.
    #[error("{0}")]
    Rejected(String),

    /// The request never produced a usable response. The detail is kept
    /// for logs; the display text stays generic.
    #[error("could not reach the backend, check the connection and retry")]
    Transport(String),
}

impl ConsoleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ConsoleError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ConsoleError::Validation(_))
    }
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;
