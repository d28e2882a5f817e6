//! Error types and gRPC status conversion

use std::time::Duration;

use thiserror::Error;
use tonic::{Code, Status};

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for healthwatch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// gRPC transport error
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Reflection service could not be built from the descriptor set
    #[error("Reflection error: {0}")]
    Reflection(String),

    /// The aggregation engine failed as a whole (not a single probe)
    #[error("{0}")]
    Aggregation(String),

    /// The scheduler no longer accepts subscriptions
    #[error("Service is shutting down")]
    ShuttingDown,

    /// Malformed request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A remote call returned a non-OK status
    #[error("RPC failed: {0}")]
    Rpc(Box<Status>),

    /// A response could not be mapped onto the health model
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Error::Config(Box::new(e))
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::Rpc(Box::new(status))
    }
}

impl From<Error> for Status {
    fn from(error: Error) -> Self {
        let code = match &error {
            Error::Rpc(status) => return (**status).clone(),
            Error::ShuttingDown => Code::Unavailable,
            Error::InvalidRequest(_) => Code::InvalidArgument,
            Error::Transport(_) => Code::Unavailable,
            Error::Config(_)
            | Error::Io(_)
            | Error::Reflection(_)
            | Error::Aggregation(_)
            | Error::Protocol(_)
            | Error::Internal(_) => Code::Internal,
        };

        Status::new(code, error.to_string())
    }
}

/// Failure of a single component probe
///
/// Never escapes the aggregation engine: it is folded into an unavailable
/// component record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The probe ran and reported an error
    #[error("{0}")]
    Failed(String),

    /// The probe did not answer within its bound
    #[error("probe timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    /// The probe panicked
    #[error("probe panicked: {0}")]
    Panicked(String),
}

impl ProbeError {
    /// Create a failure with a message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::from(Error::ShuttingDown).code(), Code::Unavailable);
        assert_eq!(
            Status::from(Error::InvalidRequest("bad".to_string())).code(),
            Code::InvalidArgument
        );

        let status = Status::from(Error::Aggregation("health check failed: boom".to_string()));
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "health check failed: boom");

        let passthrough = Status::from(Error::from(Status::not_found("nope")));
        assert_eq!(passthrough.code(), Code::NotFound);
        assert_eq!(passthrough.message(), "nope");
    }

    #[test]
    fn test_probe_error_display() {
        assert_eq!(
            ProbeError::TimedOut(Duration::from_millis(250)).to_string(),
            "probe timed out after 250ms"
        );
        assert_eq!(ProbeError::failed("refused").to_string(), "refused");
    }
}
