//! Error types for the push engine.

use std::fmt;

/// Errors the engine returns to direct callers.
///
/// Failures local to a single connection (write errors, timeouts, stale
/// heartbeats) never show up here. They are contained by deregistering
/// that one connection, and fan-out simply counts it as not delivered.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// The registry already holds `limit` connections. Callers should answer
    /// the stream request with an error instead of upgrading it.
    CapacityExceeded { limit: usize },

    /// A connection was requested without a tenant. Every delivery is scoped
    /// by tenant, so there is nothing sensible to register.
    MissingTenant,

    /// An event could not be rendered to the wire format.
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CapacityExceeded { limit } => {
                write!(f, "Connection capacity exceeded: limit is {}", limit)
            }
            Error::MissingTenant => write!(f, "A tenant id is required to open a connection"),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Failure writing a frame to a connection's transport.
#[derive(Debug, PartialEq)]
pub enum TransportError {
    /// The receiving side is gone (client disconnected or transport closed).
    Closed,
    /// Any other write failure reported by the transport.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => write!(f, "transport closed"),
            TransportError::Io(msg) => write!(f, "transport write failed: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_exceeded_message_names_the_limit() {
        let err = Error::CapacityExceeded { limit: 1000 };
        assert_eq!(
            err.to_string(),
            "Connection capacity exceeded: limit is 1000"
        );
    }

    #[test]
    fn test_serde_errors_convert_to_serialization() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(Error::from(serde_err), Error::Serialization(_)));
    }
}
