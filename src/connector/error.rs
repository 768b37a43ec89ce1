//! Connector error definitions.

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

use crate::http::StreamingMode;

/// Errors surfaced by connectors and the client pipeline.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The connection could not be established (refused, DNS, unreachable).
    #[error("Connection failed: {0}")]
    Connect(String),

    /// No progress within the configured connect or read timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// I/O failure while writing or reading an entity.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure reported by the transport library.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The connector cannot honour the requested streaming mode.
    #[error("{connector} connector does not support {mode} request entities")]
    Unsupported {
        connector: &'static str,
        mode: StreamingMode,
    },

    /// The invocation was cancelled through its handle.
    #[error("Invocation cancelled")]
    Cancelled,

    /// The worker went away without reporting an outcome.
    #[error("Invocation abandoned by its worker")]
    Abandoned,

    /// The invocation could not be turned into a valid HTTP request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ConnectorError {
    pub fn is_timeout(&self) -> bool {
        match self {
            ConnectorError::Timeout(_) => true,
            ConnectorError::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Render an error with its whole source chain.
pub(crate) fn error_chain(e: &dyn StdError) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Kind of the first `io::Error` found in the source chain of `e`.
pub(crate) fn io_error_kind(e: &(dyn StdError + 'static)) -> Option<std::io::ErrorKind> {
    let mut current = Some(e);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        current = err.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConnectorError::Unsupported {
            connector: "in-memory",
            mode: StreamingMode::Chunked,
        };
        assert_eq!(
            err.to_string(),
            "in-memory connector does not support CHUNKED request entities"
        );

        let err = ConnectorError::Timeout(Duration::from_millis(250));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Request timed out after 250ms");
    }

    #[derive(Debug, Error)]
    #[error("request failed")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn error_chain_includes_sources() {
        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(error_chain(&err), "request failed: connection refused");
        assert_eq!(
            io_error_kind(&err),
            Some(std::io::ErrorKind::ConnectionRefused)
        );
    }

    #[test]
    fn io_timeouts_count_as_timeouts() {
        let err = ConnectorError::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert!(err.is_timeout());
        assert!(!ConnectorError::Cancelled.is_timeout());
    }
}
