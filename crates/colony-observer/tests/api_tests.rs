//! Integration tests for the Observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use colony_core::monitor::{FiringSample, TickSample};
use colony_core::{SchedulerControl, TickMonitor};
use colony_observer::router::build_router;
use colony_observer::{AppState, EventGateway};
use colony_types::Subsystem;
use serde_json::Value;
use tower::ServiceExt;

fn make_test_state() -> Arc<AppState> {
    let now = Utc::now();
    Arc::new(AppState::new(
        Arc::new(TickMonitor::new(now, 16, 1000)),
        Arc::new(SchedulerControl::new(now)),
        Arc::new(EventGateway::new(8)),
    ))
}

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Vec<u8>) {
    let app = build_router(state);
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn body_to_json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn index_returns_html() {
    let (status, body) = get(make_test_state(), "/").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Colony Observer"));
    assert!(html.contains("STARTING"));
}

#[tokio::test]
async fn health_reports_running_scheduler() {
    let state = make_test_state();
    state.control.mark_healthy();
    state.control.count_tick();

    let (status, body) = get(state, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    let json = body_to_json(&body);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["totalTicks"], 1);
    assert!(json["failure"].is_null());
}

#[tokio::test]
async fn health_is_unavailable_after_failure() {
    let state = make_test_state();
    state.control.fail("store unreachable").await;

    let (status, body) = get(state, "/api/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json = body_to_json(&body);
    assert_eq!(json["status"], "failed");
    assert_eq!(json["failure"], "store unreachable");
}

#[tokio::test]
async fn stats_include_recorded_firings() {
    let state = make_test_state();
    state
        .monitor
        .record(TickSample {
            tick: 1,
            at: Utc::now(),
            duration_us: 2_000,
            firings: vec![FiringSample {
                subsystem: Subsystem::Resources,
                deviation_ms: 40,
                processed: 3,
                failed: 0,
            }],
        })
        .await;

    let (status, body) = get(Arc::clone(&state), "/api/ticks/stats").await;
    assert_eq!(status, StatusCode::OK);
    let json = body_to_json(&body);
    assert_eq!(json["totalTicks"], 1);
    assert_eq!(json["subsystems"]["resources"]["triggers"], 1);
    assert_eq!(json["subsystems"]["resources"]["maxDeviationMs"], 40);

    let (status, body) = get(state, "/api/ticks/report").await;
    assert_eq!(status, StatusCode::OK);
    let report = String::from_utf8(body).unwrap();
    assert!(report.contains("Tick monitor report"));
    assert!(report.contains("resources"));
}

#[tokio::test]
async fn ws_rejects_malformed_room_id() {
    let (status, body) = get(make_test_state(), "/ws/events?settlement=nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body_to_json(&body)["status"], 400);
}

#[tokio::test]
async fn ws_requires_an_upgrade() {
    let (status, _) = get(make_test_state(), "/ws/events").await;
    assert!(status.is_client_error());
    assert_ne!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (status, _) = get(make_test_state(), "/api/agents").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
