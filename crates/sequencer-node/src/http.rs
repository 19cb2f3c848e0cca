//! Telemetry HTTP surface: the scrape and query routes the telemetry
//! facade's own contract requires, independent of any user-facing
//! application server. Routes mirror `control-plane-api`'s handler style:
//! thin functions over `State`, `Result<Json<_>, (StatusCode, String)>`
//! for fallible ones.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use sequencer_bridge::BridgeBatcher;
use sequencer_telemetry::{PrometheusExporter, Registry, Timeframe};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub prometheus: Arc<PrometheusExporter>,
    pub bridge: Arc<BridgeBatcher>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/metrics/system", get(system_metrics))
        .route("/api/metrics/components", get(component_metrics))
        .route("/api/metrics/historical", get(historical))
        .route("/api/metrics/analysis", get(analysis))
        .route("/metrics", get(prometheus_scrape))
        .route("/ws/metrics", get(metrics_socket))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn system_metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.bridge.get_status();
    Json(serde_json::json!({
        "bridge": status,
        "series": state.registry.names(),
    }))
}

/// Component names: `sequencer`, `bridge`, `relayer`, `recovery`.
/// Every metric series for that component is assumed to be prefixed
/// `"<component>."`, matching the `bridge.*`/`checkpoint.*`/`disruptor.*`
/// naming already used when components call `Registry::incr`/`gauge`.
async fn component_metrics(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let component = params
        .get("component")
        .ok_or((StatusCode::BAD_REQUEST, "missing `component` query parameter".to_string()))?;
    let prefix = format!("{component}.");
    let series: HashMap<String, Option<f64>> = state
        .registry
        .names()
        .into_iter()
        .filter(|name| name.starts_with(&prefix))
        .map(|name| {
            let latest = state.registry.latest(&name);
            (name, latest)
        })
        .collect();
    Ok(Json(serde_json::json!({ "component": component, "series": series })))
}

#[derive(serde::Deserialize)]
struct TimeframedQuery {
    #[serde(rename = "type")]
    metric_type: String,
    timeframe: String,
}

async fn historical(
    State(state): State<AppState>,
    Query(q): Query<TimeframedQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let timeframe = parse_timeframe(&q.timeframe)?;
    let points = state.registry.query(&q.metric_type, timeframe);
    Ok(Json(serde_json::json!({ "type": q.metric_type, "points": points })))
}

async fn analysis(
    State(state): State<AppState>,
    Query(q): Query<TimeframedQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let timeframe = parse_timeframe(&q.timeframe)?;
    let analysis = state.registry.analyze(&q.metric_type, timeframe);
    Ok(Json(serde_json::json!({ "type": q.metric_type, "analysis": analysis })))
}

fn parse_timeframe(raw: &str) -> Result<Timeframe, (StatusCode, String)> {
    Timeframe::parse(raw).ok_or((StatusCode::BAD_REQUEST, format!("unknown timeframe `{raw}`")))
}

async fn prometheus_scrape(State(state): State<AppState>) -> Response {
    let body = state.prometheus.render();
    (StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], body).into_response()
}

/// Push channel: every sample recorded on the registry is forwarded
/// as a `{"event": "metric", "sample": ...}` text frame. Rather than
/// maintaining separate broadcast channels per category
/// (`system_metrics`, `component_metrics`, ...), this facade emits one
/// general `metric` event and leaves filtering by series name prefix to
/// the client.
async fn metrics_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_metrics(socket, state))
}

async fn forward_metrics(mut socket: WebSocket, state: AppState) {
    let mut rx = state.registry.subscribe();
    loop {
        tokio::select! {
            sample = rx.recv() => {
                let Ok(sample) = sample else { break };
                let payload = serde_json::json!({ "event": "metric", "sample": sample });
                if socket.send(Message::Text(payload.to_string())).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                if msg.is_none() {
                    break;
                }
            }
        }
    }
}
