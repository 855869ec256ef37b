use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 单个调制解调器的静态配置（每设备一个文件，启动时加载一次）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// 逻辑设备名。
    pub name: String,
    pub command_port_path: String,
    pub notify_port_path: String,
    /// 余额查询 USSD 串。
    pub balance_ussd: String,
}

/// 设备连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Disconnected,
    Ready,
}

/// 设备状态快照。
///
/// 只由所属监控任务整体替换写入；读者总是拿到完整的一份。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub name: String,
    pub state: DeviceState,
    /// 最近一次 USSD 余额回复，首个回复到达前为空。
    pub balance: String,
    /// 进入 Ready 的时间，未就绪时为 None。
    pub uptime_base: Option<DateTime<Utc>>,
}

impl DeviceStatus {
    pub fn disconnected(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: DeviceState::Disconnected,
            balance: String::new(),
            uptime_base: None,
        }
    }

    pub fn ready(name: impl Into<String>, since: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            state: DeviceState::Ready,
            balance: String::new(),
            uptime_base: Some(since),
        }
    }

    pub fn with_balance(&self, balance: impl Into<String>) -> Self {
        Self {
            balance: balance.into(),
            ..self.clone()
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == DeviceState::Ready
    }

    pub fn uptime_seconds(&self, now: DateTime<Utc>) -> u64 {
        match self.uptime_base {
            Some(base) => u64::try_from(now.signed_duration_since(base).num_seconds()).unwrap_or(0),
            None => 0,
        }
    }
}
