/*!
 * Status surface of the service
 *
 * - GET  /health          -> "UP" plus monitor counters
 * - GET  /metrics         -> latest published snapshot
 * - POST /simulate/{kind} -> fault injection (simulated source only)
 *
 * Handlers only read what the loop publishes; they never touch the detector.
 */

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use autonomic_core::{
    AnomalyKind, MetricsSnapshot, MonitorStats, SimulatedMetricsSource, SnapshotReader, StatsView,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub snapshots: SnapshotReader,
    pub stats: Arc<MonitorStats>,
    /// `None` in host mode
    pub simulator: Option<Arc<SimulatedMetricsSource>>,
}

#[derive(Debug, Serialize)]
struct HealthView {
    status: &'static str,
    #[serde(flatten)]
    stats: StatsView,
}

#[derive(Debug, Serialize)]
struct SimulateResponse {
    scenario: String,
    kind: AnomalyKind,
    injected: bool,
    message: String,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .route("/simulate/{scenario}", post(simulate))
        .with_state(app_state)
}

fn scenario_kind(scenario: &str) -> Option<AnomalyKind> {
    match scenario {
        "cpu-spike" => Some(AnomalyKind::HighCpu),
        "memory-leak" => Some(AnomalyKind::HighMemory),
        "slow-response" => Some(AnomalyKind::SlowResponse),
        _ => None,
    }
}

async fn get_health(State(app): State<AppState>) -> Json<HealthView> {
    Json(HealthView {
        status: "UP",
        stats: app.stats.view(),
    })
}

async fn get_metrics(State(app): State<AppState>) -> Json<MetricsSnapshot> {
    let latest = app.snapshots.latest();
    Json(latest.as_ref().clone())
}

// POST /simulate/{scenario}
async fn simulate(
    State(app): State<AppState>,
    Path(scenario): Path<String>,
) -> Result<Json<SimulateResponse>, StatusCode> {
    let simulator = app.simulator.as_ref().ok_or(StatusCode::NOT_FOUND)?;
    let kind = scenario_kind(&scenario).ok_or(StatusCode::NOT_FOUND)?;

    let injected = simulator.inject_fault(kind);
    let message = if injected {
        info!(kind = %kind, "Fault injected via /simulate/{}", scenario);
        format!("{} simulation started", scenario)
    } else {
        format!("{} simulation already active", scenario)
    };

    Ok(Json(SimulateResponse {
        scenario,
        kind,
        injected,
        message,
    }))
}
