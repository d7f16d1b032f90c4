//! Ops endpoints: health and request statistics.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::GatewayState;
use crate::service::EngineHealth;
use crate::stats::StatsSnapshot;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalHealthReport {
    pub status: String,
    pub uptime_seconds: u64,
    #[serde(flatten)]
    pub engine: EngineHealth,
    pub timestamp: DateTime<Utc>,
}

/// Handler for `GET /api/health`
pub async fn get_health(State(state): State<GatewayState>) -> Json<GlobalHealthReport> {
    Json(GlobalHealthReport {
        status: "ok".into(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        engine: state.service.health(),
        timestamp: Utc::now(),
    })
}

/// Handler for `GET /api/stats`
pub async fn get_stats(State(state): State<GatewayState>) -> Json<StatsSnapshot> {
    Json(state.service.stats())
}

/// Handler for `POST /api/stats/reset`
pub async fn reset_stats(State(state): State<GatewayState>) -> StatusCode {
    state.service.reset_stats();
    StatusCode::NO_CONTENT
}
