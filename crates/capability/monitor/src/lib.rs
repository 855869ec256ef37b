//! # 单设备监控
//!
//! 每个配置的调制解调器对应一个 `DeviceMonitor`：
//!
//! ```text
//!             RetryElapsed / AttemptOpen
//!            ┌──────────────┐
//!            ▼              │ OpenFailed
//!      Disconnected ────────┘
//!        │      ▲
//! OpenSucceeded  │ LinkLost / SessionClosed
//!        ▼      │
//!          Ready ── BalanceTick / UssdReply / Incoming
//!
//!   任意状态 ── Stop ──▶ Stopped
//! ```
//!
//! 打开失败只在本地重试（默认每 10 秒，永不放弃）；Ready 期间每 60 秒查询一次余额；
//! 入站短信包装为带新 ID 的 `Message` 写入汇聚通道。

mod id;
mod monitor;
mod state;
mod status;

pub use id::{IdError, IdGenerator, OsRngIdGenerator};
pub use monitor::DeviceMonitor;
pub use state::{Action, MonitorEvent, MonitorState, Transition, transition};
pub use status::{StatusCell, StatusReader};

use std::time::Duration;

/// 监控定时参数。
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// 断开后重连探测间隔。
    pub retry_interval: Duration,
    /// Ready 期间余额轮询间隔。
    pub balance_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(10),
            balance_interval: Duration::from_secs(60),
        }
    }
}

/// 单设备故障（只影响单个事件，不终止监控）。
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("identifier generation failed: {0}")]
    Identifier(#[from] IdError),
}

/// 上报给监管者的设备故障。
#[derive(Debug)]
pub struct DeviceFault {
    pub device: String,
    pub error: MonitorError,
}
