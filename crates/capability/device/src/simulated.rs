//! 内存模拟驱动（用于测试与本地接线）。
//!
//! 每个设备名对应一组计数器和已打开会话列表；测试通过 `SimulatedModem`
//! 注入短信、USSD 回复或拔出设备。

use crate::{DeviceDriver, DeviceError, DeviceSession, OpenedSession, SessionEvent};
use async_trait::async_trait;
use domain::{DeviceConfig, SmsPayload};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const EVENT_BUFFER: usize = 16;

#[derive(Default)]
struct Counters {
    fail_remaining: usize,
    unavailable: bool,
    open_attempts: Vec<Instant>,
    in_flight: usize,
    max_in_flight: usize,
    open_sessions: usize,
    max_open_sessions: usize,
}

struct SimDevice {
    counters: Mutex<Counters>,
    sessions: watch::Sender<Vec<SimulatedModem>>,
}

impl SimDevice {
    fn new() -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            sessions: watch::channel(Vec::new()).0,
        }
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 内存模拟驱动。
#[derive(Clone, Default)]
pub struct SimulatedDriver {
    devices: Arc<Mutex<HashMap<String, Arc<SimDevice>>>>,
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn device(&self, name: &str) -> Arc<SimDevice> {
        let mut devices = self
            .devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        devices
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(SimDevice::new()))
            .clone()
    }

    /// 接下来 `count` 次打开失败。
    pub fn fail_next_opens(&self, name: &str, count: usize) {
        self.device(name).counters().fail_remaining = count;
    }

    /// 设为不可用后所有打开都失败，直到恢复。
    pub fn set_available(&self, name: &str, available: bool) {
        self.device(name).counters().unavailable = !available;
    }

    pub fn open_attempts(&self, name: &str) -> usize {
        self.device(name).counters().open_attempts.len()
    }

    /// 每次打开尝试的（tokio）时间点。
    pub fn attempt_times(&self, name: &str) -> Vec<Instant> {
        self.device(name).counters().open_attempts.clone()
    }

    pub fn max_concurrent_opens(&self, name: &str) -> usize {
        self.device(name).counters().max_in_flight
    }

    pub fn open_sessions(&self, name: &str) -> usize {
        self.device(name).counters().open_sessions
    }

    pub fn max_open_sessions(&self, name: &str) -> usize {
        self.device(name).counters().max_open_sessions
    }

    /// 等待第 `nth` 个（从 1 开始）会话被打开。
    pub async fn wait_for_session(
        &self,
        name: &str,
        nth: usize,
    ) -> Result<SimulatedModem, DeviceError> {
        let device = self.device(name);
        let mut rx = device.sessions.subscribe();
        let sessions = rx
            .wait_for(|sessions| sessions.len() >= nth.max(1))
            .await
            .map_err(|_| DeviceError::Closed)?;
        Ok(sessions[nth.max(1) - 1].clone())
    }
}

#[async_trait]
impl DeviceDriver for SimulatedDriver {
    async fn open(&self, config: &DeviceConfig) -> Result<OpenedSession, DeviceError> {
        let device = self.device(&config.name);
        {
            let mut counters = device.counters();
            counters.open_attempts.push(Instant::now());
            counters.in_flight += 1;
            counters.max_in_flight = counters.max_in_flight.max(counters.in_flight);
        }
        // 让出一次调度，暴露并发打开。
        tokio::task::yield_now().await;

        let mut counters = device.counters();
        counters.in_flight -= 1;
        if counters.unavailable || counters.fail_remaining > 0 {
            counters.fail_remaining = counters.fail_remaining.saturating_sub(1);
            return Err(DeviceError::Unavailable(config.notify_port_path.clone()));
        }
        counters.open_sessions += 1;
        counters.max_open_sessions = counters.max_open_sessions.max(counters.open_sessions);
        drop(counters);

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let modem = SimulatedModem {
            inner: Arc::new(ModemInner {
                name: config.name.clone(),
                events: events_tx,
                link: CancellationToken::new(),
                closed: CancellationToken::new(),
                released: AtomicBool::new(false),
                queries: Mutex::new(Vec::new()),
                device: device.clone(),
            }),
        };
        device
            .sessions
            .send_modify(|sessions| sessions.push(modem.clone()));
        debug!(target: "sc.device", device = %config.name, "simulated_session_opened");

        Ok(OpenedSession {
            session: Arc::new(SimulatedSession {
                modem: modem.clone(),
            }),
            events: events_rx,
        })
    }
}

struct ModemInner {
    name: String,
    events: mpsc::Sender<SessionEvent>,
    link: CancellationToken,
    closed: CancellationToken,
    released: AtomicBool,
    queries: Mutex<Vec<String>>,
    device: Arc<SimDevice>,
}

/// 已打开模拟会话的测试侧句柄。
#[derive(Clone)]
pub struct SimulatedModem {
    inner: Arc<ModemInner>,
}

impl SimulatedModem {
    /// 模拟一条入站短信。
    pub async fn deliver_sms(&self, address: &str, text: &str) -> Result<(), DeviceError> {
        self.inner
            .events
            .send(SessionEvent::Incoming(SmsPayload::new(address, text)))
            .await
            .map_err(|_| DeviceError::Closed)
    }

    pub async fn reply_ussd(&self, text: &str) -> Result<(), DeviceError> {
        self.inner
            .events
            .send(SessionEvent::UssdReply(text.to_string()))
            .await
            .map_err(|_| DeviceError::Closed)
    }

    /// 拔出设备：`watch()` 返回。
    pub fn unplug(&self) {
        self.inner.link.cancel();
    }

    /// 驱动侧关闭会话：`closed()` 返回。
    pub fn close_remote(&self) {
        self.inner.closed.cancel();
    }

    pub fn balance_queries(&self) -> Vec<String> {
        self.inner
            .queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 监控侧是否已调用 `close()`。
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }
}

struct SimulatedSession {
    modem: SimulatedModem,
}

#[async_trait]
impl DeviceSession for SimulatedSession {
    async fn watch(&self) {
        self.modem.inner.link.cancelled().await;
    }

    async fn closed(&self) {
        self.modem.inner.closed.cancelled().await;
    }

    async fn send_balance_query(&self, ussd: &str) -> Result<(), DeviceError> {
        if self.modem.is_released() {
            return Err(DeviceError::Closed);
        }
        self.modem
            .inner
            .queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(ussd.to_string());
        Ok(())
    }

    async fn close(&self) {
        let inner = &self.modem.inner;
        if inner.released.swap(true, Ordering::SeqCst) {
            return;
        }
        inner.closed.cancel();
        let mut counters = inner.device.counters();
        counters.open_sessions = counters.open_sessions.saturating_sub(1);
        debug!(target: "sc.device", device = %inner.name, "simulated_session_released");
    }
}
