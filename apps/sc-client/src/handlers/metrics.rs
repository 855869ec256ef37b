//! 计数指标快照。
//!
//! - GET /metrics

use api_contract::{ApiResponse, MetricsSnapshotDto};
use crate::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub async fn get_metrics(State(state): State<AppState>) -> Response {
    let snapshot = state.metrics.snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            messages_captured: snapshot.messages_captured,
            messages_published: snapshot.messages_published,
            messages_dropped: snapshot.messages_dropped,
            publish_failures: snapshot.publish_failures,
            id_failures: snapshot.id_failures,
            device_connects: snapshot.device_connects,
            device_disconnects: snapshot.device_disconnects,
            open_failures: snapshot.open_failures,
            balance_queries: snapshot.balance_queries,
            balance_replies: snapshot.balance_replies,
        })),
    )
        .into_response()
}
