use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::health::{HealthReport, HealthStatus};
use crate::resilience::circuit_breaker::BreakerSnapshot;

#[derive(Serialize)]
pub struct BasicHealth {
    pub status: &'static str,
    pub service: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub status: HealthStatus,
    pub unavailable: Vec<String>,
}

fn report(state: &AdminState) -> HealthReport {
    let config = state.config.load();
    HealthReport::build(&config.service_name, state.registry.snapshots(), |name| {
        config.is_critical(name)
    })
}

pub async fn health(State(state): State<AdminState>) -> Json<BasicHealth> {
    Json(BasicHealth {
        status: "ok",
        service: state.config.load().service_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn live() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "alive": true }))
}

pub async fn ready(State(state): State<AdminState>) -> (StatusCode, Json<Readiness>) {
    let report = report(&state);
    let code = if report.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let unavailable = report
        .unhealthy_dependencies()
        .into_iter()
        .map(str::to_string)
        .collect();
    (
        code,
        Json(Readiness {
            ready: report.is_ready(),
            status: report.status,
            unavailable,
        }),
    )
}

pub async fn detailed(State(state): State<AdminState>) -> (StatusCode, Json<HealthReport>) {
    let report = report(&state);
    let code = if report.status == HealthStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

pub async fn list_breakers(State(state): State<AdminState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.registry.snapshots())
}

pub async fn get_breaker(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerSnapshot>, StatusCode> {
    state
        .registry
        .get(&name)
        .map(|breaker| Json(breaker.snapshot()))
        .ok_or(StatusCode::NOT_FOUND)
}
