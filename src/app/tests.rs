use super::{App, Backlog, Event};
use crate::config::Settings;
use axum::Router;
use axum::body::{Body, BodyDataStream};
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn app() -> (App, CancellationToken) {
    let shutdown = CancellationToken::new();
    (App::build(&Settings::default(), shutdown.clone()), shutdown)
}

async fn send(router: &Router, request: Request<Body>) -> axum::response::Response {
    router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn publish(router: &Router, payload: Value) -> axum::response::Response {
    let request = Request::builder()
        .method("POST")
        .uri("/publish")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    send(router, request).await
}

async fn subscribers(router: &Router) -> u64 {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    json_body(send(router, request).await).await["subscribers"]
        .as_u64()
        .unwrap()
}

async fn wait_for_subscribers(router: &Router, expected: u64) {
    timeout(Duration::from_secs(5), async {
        while subscribers(router).await != expected {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("timed out waiting for subscribers");
}

fn event_ids(received: &str) -> Vec<u64> {
    received
        .lines()
        .filter_map(|line| line.strip_prefix("id: "))
        .map(|id| id.parse().unwrap())
        .collect()
}

async fn open_stream(router: &Router, last_event_id: Option<&str>) -> BodyDataStream {
    let mut request = Request::builder().uri("/events");
    if let Some(id) = last_event_id {
        request = request.header("last-event-id", id);
    }
    let response = send(router, request.body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    response.into_body().into_data_stream()
}

async fn read_until(body: &mut BodyDataStream, received: &mut String, needle: &str) {
    timeout(Duration::from_secs(5), async {
        while !received.contains(needle) {
            let chunk = body.next().await.expect("stream ended").expect("body error");
            received.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}; got {received:?}"));
}

#[test]
fn test_backlog_empty_cursor_replays_nothing() {
    let backlog = Backlog::new(4);
    backlog.record("1", 'a');
    backlog.record("2", 'b');
    assert!(backlog.since("").is_empty());
}

#[test]
fn test_backlog_replays_after_known_cursor() {
    let backlog = Backlog::new(8);
    for (id, m) in [("101", 1), ("201", 2), ("301", 3), ("401", 4)] {
        backlog.record(id, m);
    }
    assert_eq!(backlog.since("201"), vec![3, 4]);
    assert!(backlog.since("401").is_empty());
}

#[test]
fn test_backlog_unknown_cursor_replays_everything_retained() {
    let backlog = Backlog::new(2);
    backlog.record("1", 'a');
    backlog.record("2", 'b');
    backlog.record("3", 'c');

    assert_eq!(backlog.len(), 2);
    assert_eq!(backlog.since("1"), vec!['b', 'c']);
    assert_eq!(backlog.since("nope"), vec!['b', 'c']);
}

#[test]
fn test_event_id_is_not_serialized() {
    let event = Event::new(7, json!({ "x": 1 }));
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(event.event_id(), "7");
    assert!(value.get("id").is_none());
    assert_eq!(value["payload"], json!({ "x": 1 }));
    assert!(value["published_at"].is_string());
}

#[tokio::test]
async fn test_publish_assigns_sequential_ids() {
    let (app, _shutdown) = app();

    let first = publish(&app.router, json!({ "n": 1 })).await;
    assert_eq!(first.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(first).await, json!({ "id": 1 }));

    let second = publish(&app.router, json!({ "n": 2 })).await;
    assert_eq!(json_body(second).await, json!({ "id": 2 }));
}

#[tokio::test]
async fn test_health_reports_counts() {
    let (app, _shutdown) = app();
    publish(&app.router, json!("hello")).await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let body = json_body(send(&app.router, request).await).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["subscribers"], 0);
    assert_eq!(body["backlog"], 1);
}

#[tokio::test]
async fn test_published_events_reach_stream_with_ids() {
    let (app, _shutdown) = app();

    let request = Request::builder().uri("/events").body(Body::empty()).unwrap();
    let response = send(&app.router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body().into_data_stream();
    let mut received = String::new();
    read_until(&mut body, &mut received, ":\n\n").await;
    wait_for_subscribers(&app.router, 1).await;

    publish(&app.router, json!({ "msg": "hi" })).await;
    read_until(&mut body, &mut received, "id: 1\n").await;

    assert!(received.starts_with(":\n\nid: 1\ndata: {\"payload\":{\"msg\":\"hi\"},\"published_at\":"));
    assert!(received.ends_with("}\n\n"));
}

#[tokio::test]
async fn test_reconnecting_client_catches_up_from_backlog() {
    let (app, _shutdown) = app();
    for n in 1..=3 {
        publish(&app.router, json!(n)).await;
    }
    // Let the controller fan these out before anyone is listening.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let request = Request::builder()
        .uri("/events")
        .header("last-event-id", "1")
        .body(Body::empty())
        .unwrap();
    let mut body = send(&app.router, request).await.into_body().into_data_stream();
    let mut received = String::new();
    read_until(&mut body, &mut received, "id: 3\n").await;

    assert!(received.starts_with("id: 2\ndata: {\"payload\":2,"));
    assert!(received.contains("id: 3\ndata: {\"payload\":3,"));
    assert!(!received.contains("id: 1\n"));
}

#[tokio::test]
async fn test_publish_after_shutdown_is_unavailable() {
    let (app, shutdown) = app();
    shutdown.cancel();
    app.controller.await.unwrap();

    let response = publish(&app.router, json!("late")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_rejected_publish_is_not_replayed() {
    let (app, shutdown) = app();
    shutdown.cancel();
    app.controller.await.unwrap();

    let response = publish(&app.router, json!("late")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let health = json_body(send(&app.router, request).await).await;
    assert_eq!(health["backlog"], 0);
}

#[tokio::test]
async fn test_concurrent_publishes_keep_id_order_live_and_on_replay() {
    let (app, _shutdown) = app();
    let mut live = open_stream(&app.router, None).await;
    let mut received = String::new();
    read_until(&mut live, &mut received, ":\n\n").await;
    wait_for_subscribers(&app.router, 1).await;

    let responses =
        futures::future::join_all((1..=20).map(|n| publish(&app.router, json!(n)))).await;
    let mut assigned = Vec::new();
    for response in responses {
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assigned.push(json_body(response).await["id"].as_u64().unwrap());
    }
    assigned.sort_unstable();
    assert_eq!(assigned, (1..=20).collect::<Vec<u64>>());

    read_until(&mut live, &mut received, "id: 20\n").await;
    assert_eq!(event_ids(&received), (1..=20).collect::<Vec<u64>>());

    let mut resumed = open_stream(&app.router, Some("10")).await;
    let mut replayed = String::new();
    read_until(&mut resumed, &mut replayed, "id: 20\n").await;
    assert_eq!(event_ids(&replayed), (11..=20).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let (app, _shutdown) = app();

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = send(&app.router, request).await;
    assert_eq!(response.headers()["x-request-id"], "req-42");

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = send(&app.router, request).await;
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _shutdown) = app();
    let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
    let response = send(&app.router, request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
