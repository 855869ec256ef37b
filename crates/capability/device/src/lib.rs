//! # 设备会话能力模块
//!
//! 物理调制解调器的 AT 指令协议由外部驱动实现，这里只定义监控层消费的契约：
//!
//! ```text
//! DeviceDriver::open(config)
//!       │
//!       ▼
//! OpenedSession { session, events }
//!       │
//!       ├── session.watch()               链路丢失时返回
//!       ├── session.closed()              会话关闭信号
//!       ├── session.send_balance_query()  USSD 余额查询（发出即返回）
//!       ├── session.close()               幂等释放端口
//!       └── events: SessionEvent          USSD 回复 / 入站短信
//! ```
//!
//! 所有调用都可能阻塞或异步完成，调用方不能假设同步完成。
//!
//! 内存模拟驱动位于 `simulated` feature 之后，只供测试依赖启用。

#[cfg(feature = "simulated")]
mod simulated;

#[cfg(feature = "simulated")]
pub use simulated::{SimulatedDriver, SimulatedModem};

use async_trait::async_trait;
use domain::{DeviceConfig, SmsPayload};
use std::sync::Arc;
use tokio::sync::mpsc;

/// 设备会话错误。
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// 端口无法占用或初始化失败（瞬时错误，由监控本地重试）。
    #[error("device unavailable: {0}")]
    Unavailable(String),
    #[error("session closed")]
    Closed,
}

/// 会话通知。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// USSD 回复原文（余额信息）。
    UssdReply(String),
    /// 入站短信。
    Incoming(SmsPayload),
}

/// 一次成功打开的会话：控制面 + 通知流。
pub struct OpenedSession {
    pub session: Arc<dyn DeviceSession>,
    pub events: mpsc::Receiver<SessionEvent>,
}

/// 设备驱动：负责打开并初始化端口。
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    async fn open(&self, config: &DeviceConfig) -> Result<OpenedSession, DeviceError>;
}

/// 已打开的设备会话。
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// 阻塞直到检测到物理链路丢失。
    async fn watch(&self);

    /// 会话关闭时返回。
    async fn closed(&self);

    async fn send_balance_query(&self, ussd: &str) -> Result<(), DeviceError>;

    /// 释放端口，重复调用无副作用。
    async fn close(&self);
}

/// 占位驱动：始终报告设备不可用（真实 AT 驱动由外部提供）。
#[derive(Debug, Default)]
pub struct NoopDriver;

#[async_trait]
impl DeviceDriver for NoopDriver {
    async fn open(&self, config: &DeviceConfig) -> Result<OpenedSession, DeviceError> {
        Err(DeviceError::Unavailable(format!(
            "no driver for {}",
            config.notify_port_path
        )))
    }
}
