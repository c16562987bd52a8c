//! Request tracing middleware.
//!
//! Every request is tagged with an `x-request-id` (taken from the request or
//! freshly generated), handled inside a span carrying that id, and logged on
//! completion with its status and latency.

use std::time::Instant;

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Instrument, debug, error, info, info_span};

pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub async fn request_logging(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        debug!("Handling request");
        let start = Instant::now();
        let mut response = next.run(request).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID, value);
        }

        let status = response.status().as_u16();
        if response.status().is_server_error() {
            error!(status, elapsed_ms, "Request finished");
        } else {
            info!(status, elapsed_ms, "Request finished");
        }
        response
    }
    .instrument(span)
    .await
}
