//! # 设备群监管
//!
//! 每个设备配置启动一个 `DeviceMonitor` 任务，所有监控共用一条有界汇聚通道：
//!
//! ```text
//! monitor(A) ──┐
//! monitor(B) ──┼──▶ mpsc::channel(capacity) ──▶ 发布任务
//! monitor(C) ──┘
//! ```
//!
//! 监管者自身不持有发送端：关停时所有监控退出并释放发送端，
//! 通道在排空后自然关闭，消费端据此观察到流结束。

use domain::{DeviceConfig, DeviceStatus, Message};
use sc_device::DeviceDriver;
use sc_monitor::{DeviceFault, DeviceMonitor, IdGenerator, MonitorConfig, StatusReader};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 监管错误（仅在启动时出现）。
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("no devices configured")]
    NoDevicesConfigured,
    #[error("duplicate device: {0}")]
    DuplicateDevice(String),
}

/// 监管参数。
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// 汇聚通道容量。
    pub channel_capacity: usize,
    pub monitor: MonitorConfig,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 200,
            monitor: MonitorConfig::default(),
        }
    }
}

impl FleetConfig {
    fn sanitized(mut self) -> Self {
        if self.channel_capacity == 0 {
            self.channel_capacity = 1;
        }
        self
    }
}

/// 启动后交给调用方的消费端。
pub struct FleetChannels {
    pub messages: mpsc::Receiver<Message>,
    pub faults: mpsc::UnboundedReceiver<DeviceFault>,
}

/// 设备状态只读视图，按配置顺序排列，可随意克隆。
#[derive(Clone)]
pub struct FleetStatus {
    devices: Arc<Vec<(String, StatusReader)>>,
}

impl FleetStatus {
    pub fn snapshot(&self) -> Vec<DeviceStatus> {
        self.devices
            .iter()
            .map(|(_, reader)| reader.snapshot())
            .collect()
    }

    /// 按名称查询（忽略大小写）。
    pub fn get(&self, name: &str) -> Option<DeviceStatus> {
        self.devices
            .iter()
            .find(|(device, _)| device.eq_ignore_ascii_case(name))
            .map(|(_, reader)| reader.snapshot())
    }
}

/// 设备群监管者。
pub struct FleetSupervisor {
    stop: CancellationToken,
    tasks: Vec<(String, JoinHandle<()>)>,
    status: FleetStatus,
}

impl FleetSupervisor {
    /// 为每个设备启动监控任务（需在 tokio 运行时内调用）。
    pub fn start(
        devices: Vec<DeviceConfig>,
        driver: Arc<dyn DeviceDriver>,
        ids: Arc<dyn IdGenerator>,
        config: FleetConfig,
    ) -> Result<(Self, FleetChannels), FleetError> {
        if devices.is_empty() {
            return Err(FleetError::NoDevicesConfigured);
        }
        let mut seen = HashSet::new();
        for device in &devices {
            if !seen.insert(device.name.to_ascii_lowercase()) {
                return Err(FleetError::DuplicateDevice(device.name.clone()));
            }
        }

        let config = config.sanitized();
        let (tx, messages) = mpsc::channel(config.channel_capacity);
        let (fault_tx, faults) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();

        let mut readers = Vec::with_capacity(devices.len());
        let mut tasks = Vec::with_capacity(devices.len());
        for device in devices {
            let name = device.name.clone();
            let monitor = DeviceMonitor::new(
                device,
                config.monitor.clone(),
                driver.clone(),
                ids.clone(),
                tx.clone(),
                fault_tx.clone(),
            );
            readers.push((name.clone(), monitor.status()));
            tasks.push((name, tokio::spawn(monitor.run(stop.child_token()))));
        }

        info!(
            target: "sc.fleet",
            devices = tasks.len(),
            channel_capacity = config.channel_capacity,
            "fleet_started"
        );

        Ok((
            Self {
                stop,
                tasks,
                status: FleetStatus {
                    devices: Arc::new(readers),
                },
            },
            FleetChannels { messages, faults },
        ))
    }

    pub fn status(&self) -> FleetStatus {
        self.status.clone()
    }

    /// 通知所有监控停止并等待其退出（会话关闭、定时器停止）。
    ///
    /// 监控在汇聚通道已满时会等待消费端腾出空间，调用期间消费端需持续排空。
    pub async fn shutdown(self) {
        self.stop.cancel();
        for (device, task) in self.tasks {
            if let Err(err) = task.await {
                warn!(target: "sc.fleet", device = %device, error = %err, "monitor_join_failed");
            }
        }
        info!(target: "sc.fleet", "fleet_stopped");
    }
}

/// 记录设备故障直到通道关闭（所有监控退出后）。
pub async fn log_faults(mut faults: mpsc::UnboundedReceiver<DeviceFault>) {
    while let Some(fault) = faults.recv().await {
        warn!(target: "sc.fleet", device = %fault.device, error = %fault.error, "device_fault");
    }
}
