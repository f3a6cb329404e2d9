//! REST API endpoint handlers for the Observer server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/health` | Scheduler health (503 once failed) |
//! | `GET` | `/api/ticks/stats` | Tick timing statistics as JSON |
//! | `GET` | `/api/ticks/report` | Human-readable performance report |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use chrono::Utc;
use colony_core::HealthStatus;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing scheduler status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = Utc::now();
    let health = state.control.health(now).await;
    let snapshot = state.monitor.snapshot(now).await;
    let status = format!("{:?}", health.status).to_uppercase();
    let ticks = health.total_ticks;
    let avg = snapshot.avg_tick_ms;
    let max = snapshot.max_tick_ms;
    let clients = state.gateway.subscriber_count();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Colony Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li::before {{ content: "GET "; color: #7ee787; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Colony Observer</h1>
    <p>Status: <strong>{status}</strong></p>
    <div>
        <div class="metric"><div class="label">Ticks</div><div class="value">{ticks}</div></div>
        <div class="metric"><div class="label">Avg ms</div><div class="value">{avg}</div></div>
        <div class="metric"><div class="label">Max ms</div><div class="value">{max}</div></div>
        <div class="metric"><div class="label">Clients</div><div class="value">{clients}</div></div>
    </div>
    <ul>
        <li><a href="/api/health">/api/health</a></li>
        <li><a href="/api/ticks/stats">/api/ticks/stats</a></li>
        <li><a href="/api/ticks/report">/api/ticks/report</a></li>
        <li>/ws/events?world=&lt;id&gt;&amp;settlement=&lt;id&gt;</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

/// Report scheduler health.
///
/// Responds 200 while the scheduler is starting, running or cleanly
/// stopped, and 503 once it has failed.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.control.health(Utc::now()).await;
    let status = if report.status == HealthStatus::Failed {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(report))
}

// ---------------------------------------------------------------------------
// GET /api/ticks/*
// ---------------------------------------------------------------------------

/// Tick timing statistics.
pub async fn tick_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.monitor.snapshot(Utc::now()).await)
}

/// Plain-text performance report.
pub async fn tick_report(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.monitor.report(Utc::now()).await
}
