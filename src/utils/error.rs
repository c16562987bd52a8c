//! The `error` module defines the error type shared across the `ssehub` crate.
//!
//! Library code returns `Result<_, HubError>`; the HTTP layer turns the
//! variants a client can trigger into proper status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    /// The client asked for a representation other than `text/event-stream`.
    #[error("content-type {0} is not supported")]
    UnsupportedAccept(String),

    /// The client went away while we were writing to it.
    #[error("client disconnected")]
    Disconnected,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = match self {
            HubError::UnsupportedAccept(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
