//! HTTP 错误响应辅助函数（统一 ApiResponse 格式）。

use api_contract::ApiResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// 设备未配置
pub fn device_not_found(name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error(
            "DEVICE.NOT_FOUND",
            format!("device not found: {}", name),
        )),
    )
        .into_response()
}
