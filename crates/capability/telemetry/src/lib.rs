//! 日志初始化与进程级计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 计数指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
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

/// 进程级计数指标。
pub struct TelemetryMetrics {
    messages_captured: AtomicU64,
    messages_published: AtomicU64,
    messages_dropped: AtomicU64,
    publish_failures: AtomicU64,
    id_failures: AtomicU64,
    device_connects: AtomicU64,
    device_disconnects: AtomicU64,
    open_failures: AtomicU64,
    balance_queries: AtomicU64,
    balance_replies: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            messages_captured: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            id_failures: AtomicU64::new(0),
            device_connects: AtomicU64::new(0),
            device_disconnects: AtomicU64::new(0),
            open_failures: AtomicU64::new(0),
            balance_queries: AtomicU64::new(0),
            balance_replies: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_captured: self.messages_captured.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            id_failures: self.id_failures.load(Ordering::Relaxed),
            device_connects: self.device_connects.load(Ordering::Relaxed),
            device_disconnects: self.device_disconnects.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
            balance_queries: self.balance_queries.load(Ordering::Relaxed),
            balance_replies: self.balance_replies.load(Ordering::Relaxed),
        }
    }

    pub fn record_message_captured(&self) {
        self.messages_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_id_failure(&self) {
        self.id_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_device_connect(&self) {
        self.device_connects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_device_disconnect(&self) {
        self.device_disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_open_failure(&self) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_balance_query(&self) {
        self.balance_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_balance_reply(&self) {
        self.balance_replies.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例；`record_*` 函数写入该实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，RUST_LOG 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成 HTTP 请求 ID。
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录捕获到的短信数。
pub fn record_message_captured() {
    metrics().record_message_captured();
}

/// 记录成功发布数。
pub fn record_message_published() {
    metrics().record_message_published();
}

/// 记录重试耗尽后丢弃的消息数。
pub fn record_message_dropped() {
    metrics().record_message_dropped();
}

/// 记录单次发布尝试失败数。
pub fn record_publish_failure() {
    metrics().record_publish_failure();
}

/// 记录 ID 生成失败数。
pub fn record_id_failure() {
    metrics().record_id_failure();
}

/// 记录设备进入 Ready 次数。
pub fn record_device_connect() {
    metrics().record_device_connect();
}

/// 记录设备掉线次数。
pub fn record_device_disconnect() {
    metrics().record_device_disconnect();
}

/// 记录打开设备失败次数。
pub fn record_open_failure() {
    metrics().record_open_failure();
}

/// 记录余额查询下发次数。
pub fn record_balance_query() {
    metrics().record_balance_query();
}

/// 记录余额回复次数。
pub fn record_balance_reply() {
    metrics().record_balance_reply();
}
