//! HTTP surfaces: the status page and JSON endpoint, and the metrics port.
//!
//! Handlers never write to the spreadsheet. Fleet reads go through the shared
//! cache on the blocking pool; upstream failures degrade to an error panel or
//! an `error` field instead of a 5xx.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use fleetsync_render::StatusPage;
use fleetsync_sync::FleetData;

use crate::telemetry::{request, Telemetry};

#[derive(Clone)]
pub struct WebState {
    pub fleet: Arc<FleetData>,
    pub page: Arc<StatusPage>,
    pub telemetry: Arc<Telemetry>,
    pub namespace: Arc<str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub rsync_filter: Option<String>,
}

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

/// `/` and `/json_status`; everything else is a 404.
pub fn status_router(state: WebState) -> Router {
    Router::new()
        .route("/", get(root_page))
        .route("/json_status", get(json_status))
        .fallback(not_found)
        .with_state(state)
}

/// `/metrics` in the Prometheus text format.
pub fn metrics_router(telemetry: Arc<Telemetry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(telemetry)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn root_page(State(state): State<WebState>) -> Response {
    let _timer = state.telemetry.request(request::ROOT_URL).start_timer();
    let fleet = state.fleet.clone();
    let namespace = state.namespace.clone();
    let fetched = tokio::task::spawn_blocking(move || fleet.get(&namespace))
        .await
        .map_err(|e| format!("fleet fetch task failed: {e}"))
        .and_then(|result| result.map_err(|e| e.to_string()));

    let rendered = match fetched {
        Ok(records) => state.page.render_records(&records, Utc::now()),
        Err(message) => {
            tracing::error!(error = %message, "unable to retrieve data from datastore");
            state.page.render_error(&message)
        }
    };
    match rendered {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            tracing::error!(%err, "status page render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn json_status(
    State(state): State<WebState>,
    query: Option<Query<StatusQuery>>,
) -> Json<Value> {
    let _timer = state.telemetry.request(request::JSON).start_timer();
    let fragment = query
        .and_then(|Query(q)| q.rsync_filter)
        .unwrap_or_default();
    let fleet = state.fleet.clone();
    let namespace = state.namespace.clone();
    let matched = tokio::task::spawn_blocking(move || fleet.matching(&namespace, &fragment))
        .await
        .map_err(|e| format!("fleet fetch task failed: {e}"))
        .and_then(|result| result.map_err(|e| e.to_string()));

    match matched {
        Ok(records) => Json(json!({ "result": records })),
        Err(message) => {
            tracing::error!(error = %message, "json status fetch failed");
            Json(json!({ "result": [], "error": message }))
        }
    }
}

async fn not_found(State(state): State<WebState>) -> StatusCode {
    let _timer = state.telemetry.request(request::ERROR).start_timer();
    StatusCode::NOT_FOUND
}

async fn metrics(State(telemetry): State<Arc<Telemetry>>) -> Response {
    let encoded = tokio::task::spawn_blocking(move || telemetry.encode()).await;
    match encoded {
        Ok(Ok(body)) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Ok(Err(err)) => {
            tracing::error!(%err, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
        Err(err) => {
            tracing::error!(%err, "metrics task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
