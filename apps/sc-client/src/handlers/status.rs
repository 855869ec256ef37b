//! 设备状态查询（只读，不阻塞监控任务）。
//!
//! - GET /health
//! - GET /devices
//! - GET /devices/:name

use api_contract::{ApiResponse, DeviceStatusDto, HealthDto};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::AppState;
use crate::utils::response::device_not_found;

pub async fn health(State(state): State<AppState>) -> Response {
    let devices = state.fleet.snapshot();
    let health = HealthDto {
        ok: true,
        devices: devices.len(),
        ready: devices.iter().filter(|status| status.is_ready()).count(),
    };
    (StatusCode::OK, Json(ApiResponse::success(health))).into_response()
}

pub async fn list_devices(State(state): State<AppState>) -> Response {
    let now = Utc::now();
    let devices = state
        .fleet
        .snapshot()
        .iter()
        .map(|status| DeviceStatusDto::from_status(status, now))
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(ApiResponse::success(devices))).into_response()
}

pub async fn get_device(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.fleet.get(&name) {
        Some(status) => (
            StatusCode::OK,
            Json(ApiResponse::success(DeviceStatusDto::from_status(
                &status,
                Utc::now(),
            ))),
        )
            .into_response(),
        None => device_not_found(&name),
    }
}
