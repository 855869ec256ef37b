//! 路由定义
//!
//! 只读状态接口：
//! - 健康检查：/health
//! - 设备状态：/devices, /devices/:name（名称忽略大小写）
//! - 计数指标：/metrics

use super::AppState;
use super::handlers::*;
use super::middleware::request_context;
use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

/// 创建状态接口路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/devices", get(list_devices))
        .route("/devices/:name", get(get_device))
        .route("/metrics", get(get_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id
        .layer(middleware::from_fn(request_context))
}
