//! The `app` module wires the hub into a runnable relay.
//!
//! Publishers `POST` JSON to `/publish`; every payload is stamped with a
//! sequence id, handed to the hub controller, which fans it out to every
//! client on the event stream, and remembered in a bounded [`Backlog`] for
//! replay once the controller has accepted it.

pub mod backlog;
pub mod event;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{Router, middleware};
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use backlog::Backlog;
pub use event::Event;

use crate::broker::{Bus, controller};
use crate::config::Settings;
use crate::transport::SseHandler;
use crate::transport::middleware::request_logging;

/// State shared by the publish and health routes.
#[derive(Clone)]
pub struct AppState {
    /// Next id to hand out. Held across the send so ids, backlog order and
    /// hub order always agree.
    next_id: Arc<Mutex<u64>>,
    backlog: Arc<Backlog<Event>>,
    source: mpsc::Sender<Event>,
    bus: Arc<Bus<Event>>,
}

/// A fully wired relay: the router to serve and the controller task feeding it.
pub struct App {
    pub router: Router,
    pub controller: JoinHandle<()>,
}

impl App {
    /// Builds the relay and starts its hub controller. Everything stops once
    /// `shutdown` is cancelled.
    pub fn build(settings: &Settings, shutdown: CancellationToken) -> Self {
        let bus = Arc::new(Bus::new());
        let backlog = Arc::new(Backlog::new(settings.hub.backlog_size));
        let (source, source_rx) = mpsc::channel(settings.hub.source_capacity.max(1));
        let controller = controller::spawn(bus.clone(), source_rx, shutdown.clone());

        let replay = backlog.clone();
        let events = SseHandler::new(bus.clone(), shutdown, settings.hub.clone())
            .with_event_id(Event::event_id)
            .with_catch_up(move |last_event_id| replay.since(last_event_id));

        let state = AppState {
            next_id: Arc::new(Mutex::new(1)),
            backlog,
            source,
            bus,
        };

        let router = Arc::new(events)
            .router(&settings.server.events_path)
            .merge(
                Router::new()
                    .route("/publish", post(publish))
                    .route("/health", get(health))
                    .with_state(state),
            )
            .layer(middleware::from_fn(request_logging));

        Self { router, controller }
    }
}

/// POST /publish
async fn publish(State(state): State<AppState>, Json(payload): Json<Value>) -> Response {
    let mut next_id = state.next_id.lock().await;
    let id = *next_id;
    let event = Event::new(id, payload);

    // Nothing is recorded unless the controller took the event; a cancelled
    // request leaves both the counter and the backlog untouched.
    match state.source.send(event.clone()).await {
        Ok(()) => {
            *next_id += 1;
            state.backlog.record(event.event_id(), event);
            debug!(id, "Accepted event");
            (StatusCode::ACCEPTED, Json(json!({ "id": id }))).into_response()
        }
        Err(_) => {
            warn!(id, "Hub is shutting down; event not published");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "hub is shutting down" })),
            )
                .into_response()
        }
    }
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "subscribers": state.bus.len(),
        "backlog": state.backlog.len(),
    }))
}

#[cfg(test)]
mod tests;
