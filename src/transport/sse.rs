//! `text/event-stream` endpoint
//!
//! `SseHandler` holds everything the sessions share: the broadcast bus, the
//! hub-wide shutdown token, the formatter and the optional catch-up resolver.
//! Each accepted request gets its own [`Session`] task which writes into a
//! channel-backed response body.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{ACCEPT, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span};

use super::format::{Formatter, ResolveEventId};
use super::session::Session;
use super::writer::EventWriter;
use crate::broker::Bus;
use crate::config::HubSettings;
use crate::utils::HubError;

pub const EVENT_STREAM: &str = "text/event-stream";

/// Header carrying the id of the last event a reconnecting client saw.
pub const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

/// Resolves the messages a client missed, given its last seen event id
/// (empty when it sent none). Returned messages are replayed in order.
pub type OnConnect<T> = Arc<dyn Fn(&str) -> Vec<T> + Send + Sync>;

pub struct SseHandler<T> {
    bus: Arc<Bus<T>>,
    shutdown: CancellationToken,
    settings: HubSettings,
    formatter: Formatter<T>,
    on_connect: Option<OnConnect<T>>,
}

impl<T> SseHandler<T>
where
    T: Serialize + Send + Sync + 'static,
{
    pub fn new(bus: Arc<Bus<T>>, shutdown: CancellationToken, settings: HubSettings) -> Self {
        Self {
            bus,
            shutdown,
            settings,
            formatter: Formatter::new(None),
            on_connect: None,
        }
    }

    /// Tags every outgoing message with the id returned by `resolve`.
    pub fn with_event_id<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        let resolve: ResolveEventId<T> = Arc::new(resolve);
        self.formatter = Formatter::new(Some(resolve));
        self
    }

    /// Replays the messages returned by `resolve` to every new connection.
    pub fn with_catch_up<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&str) -> Vec<T> + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(resolve));
        self
    }

    pub fn bus(&self) -> &Arc<Bus<T>> {
        &self.bus
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    pub(crate) fn formatter(&self) -> &Formatter<T> {
        &self.formatter
    }

    pub(crate) fn on_connect(&self) -> Option<&OnConnect<T>> {
        self.on_connect.as_ref()
    }

    /// A router serving the stream at `path`.
    pub fn router(self: Arc<Self>, path: &str) -> Router {
        Router::new()
            .route(path, get(stream_events::<T>))
            .with_state(self)
    }

    /// Accepts or rejects `request`. On acceptance the session is spawned and
    /// the streaming response is returned straight away.
    pub fn open(self: Arc<Self>, request: Request) -> Result<Response, HubError> {
        negotiate(request.headers())?;

        let last_event_id = request
            .headers()
            .get(LAST_EVENT_ID)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let (writer, body) = EventWriter::channel(self.settings.write_buffer);
        let span = info_span!("sse_session", remote_addr = ?remote_addr);
        let session = Session::new(self, writer, last_event_id, remote_addr);
        tokio::spawn(session.run().instrument(span));

        let headers = [
            (CONTENT_TYPE, EVENT_STREAM),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
        ];
        Ok((headers, Body::from_stream(ReceiverStream::new(body))).into_response())
    }
}

/// GET handler for the event stream.
pub async fn stream_events<T>(
    State(handler): State<Arc<SseHandler<T>>>,
    request: Request,
) -> Response
where
    T: Serialize + Send + Sync + 'static,
{
    match handler.open(request) {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// An explicit `accept` header must allow `text/event-stream`.
pub fn negotiate(headers: &HeaderMap) -> Result<(), HubError> {
    let Some(accept) = headers.get(ACCEPT) else {
        return Ok(());
    };
    let accept = String::from_utf8_lossy(accept.as_bytes());
    if accept.is_empty() || accept == "*/*" || accept.starts_with(EVENT_STREAM) {
        Ok(())
    } else {
        Err(HubError::UnsupportedAccept(accept.into_owned()))
    }
}
