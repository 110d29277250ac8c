use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::*;

use sse::Error as EngineError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Rejected by the push engine.
    Engine(EngineError),
    /// No open connection with the given id.
    ConnectionNotFound(String),
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        match self {
            Error::Engine(err) => write!(fmt, "{err}"),
            Error::ConnectionNotFound(id) => write!(fmt, "Connection {id} not found"),
        }
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html#associatedconstant.UNPROCESSABLE_ENTITY
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Engine(EngineError::CapacityExceeded { limit }) => {
                warn!("Refusing event stream, {limit} connections already open");
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE UNAVAILABLE").into_response()
            }
            Error::Engine(EngineError::MissingTenant) => {
                (StatusCode::BAD_REQUEST, "BAD REQUEST").into_response()
            }
            Error::Engine(EngineError::Serialization(msg)) => {
                error!("Failed to render event: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
            }
            Error::ConnectionNotFound(_) => (StatusCode::NOT_FOUND, "NOT FOUND").into_response(),
        }
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_status_codes() {
        let cases = [
            (
                Error::from(EngineError::CapacityExceeded { limit: 10 }),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (Error::from(EngineError::MissingTenant), StatusCode::BAD_REQUEST),
            (
                Error::from(EngineError::Serialization("bad".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                Error::ConnectionNotFound("abc".to_string()),
                StatusCode::NOT_FOUND,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
