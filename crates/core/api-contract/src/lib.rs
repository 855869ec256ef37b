//! 状态接口的稳定 DTO 与 API 响应契约。

use chrono::{DateTime, Utc};
use domain::DeviceStatus;
use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 单设备状态。
///
/// 未就绪设备固定为 `{ready: false, uptime_seconds: 0, balance: ""}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatusDto {
    pub name: String,
    pub ready: bool,
    pub uptime_seconds: u64,
    pub balance: String,
}

impl DeviceStatusDto {
    pub fn from_status(status: &DeviceStatus, now: DateTime<Utc>) -> Self {
        Self {
            name: status.name.clone(),
            ready: status.is_ready(),
            uptime_seconds: status.uptime_seconds(now),
            balance: status.balance.clone(),
        }
    }
}

/// 健康检查响应。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthDto {
    pub ok: bool,
    pub devices: usize,
    pub ready: usize,
}

/// 进程计数指标。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshotDto {
    pub messages_captured: u64,
    pub messages_published: u64,
    pub messages_dropped: u64,
    pub publish_failures: u64,
    pub id_failures: u64,
    pub device_connects: u64,
    pub device_disconnects: u64,
    pub open_failures: u64,
    pub balance_queries: u64,
    pub balance_replies: u64,
}
