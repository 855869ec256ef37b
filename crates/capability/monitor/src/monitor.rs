use crate::state::{Action, MonitorEvent, MonitorState, transition};
use crate::{DeviceFault, IdGenerator, MonitorConfig, MonitorError, StatusCell, StatusReader};
use chrono::Utc;
use domain::{DeviceConfig, DeviceStatus, Message, SmsPayload};
use sc_device::{DeviceDriver, DeviceSession, OpenedSession, SessionEvent};
use sc_telemetry::{
    record_balance_query, record_balance_reply, record_device_connect, record_device_disconnect,
    record_id_failure, record_message_captured, record_open_failure,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 带数据的输入；`event()` 映射为转移表中的事件。
enum Input {
    RetryElapsed,
    Opened(OpenedSession),
    OpenFailed,
    LinkLost,
    SessionClosed,
    BalanceTick,
    Ussd(String),
    Incoming(SmsPayload),
    Stop,
}

impl Input {
    fn event(&self) -> MonitorEvent {
        match self {
            Input::RetryElapsed => MonitorEvent::RetryElapsed,
            Input::Opened(_) => MonitorEvent::OpenSucceeded,
            Input::OpenFailed => MonitorEvent::OpenFailed,
            Input::LinkLost => MonitorEvent::LinkLost,
            Input::SessionClosed => MonitorEvent::SessionClosed,
            Input::BalanceTick => MonitorEvent::BalanceTick,
            Input::Ussd(_) => MonitorEvent::UssdReply,
            Input::Incoming(_) => MonitorEvent::Incoming,
            Input::Stop => MonitorEvent::Stop,
        }
    }
}

/// Ready 期间持有的会话资源。
struct ActiveSession {
    session: Arc<dyn DeviceSession>,
    events: mpsc::Receiver<SessionEvent>,
    watcher: JoinHandle<()>,
    ticker: Interval,
}

/// 单设备监控。
pub struct DeviceMonitor {
    config: DeviceConfig,
    settings: MonitorConfig,
    driver: Arc<dyn DeviceDriver>,
    ids: Arc<dyn IdGenerator>,
    messages: mpsc::Sender<Message>,
    faults: mpsc::UnboundedSender<DeviceFault>,
    status: StatusCell,
    state: MonitorState,
    active: Option<ActiveSession>,
    retry_at: Option<Instant>,
}

impl DeviceMonitor {
    pub fn new(
        config: DeviceConfig,
        settings: MonitorConfig,
        driver: Arc<dyn DeviceDriver>,
        ids: Arc<dyn IdGenerator>,
        messages: mpsc::Sender<Message>,
        faults: mpsc::UnboundedSender<DeviceFault>,
    ) -> Self {
        let status = StatusCell::new(config.name.clone());
        Self {
            config,
            settings,
            driver,
            ids,
            messages,
            faults,
            status,
            state: MonitorState::Disconnected,
            active: None,
            retry_at: None,
        }
    }

    pub fn status(&self) -> StatusReader {
        self.status.subscribe()
    }

    /// 运行直到 `stop` 被取消。
    ///
    /// 设备缺席时会按 `retry_interval` 无限重试，是常驻后台任务；
    /// 退出前关闭会话并停止所有定时器。
    pub async fn run(mut self, stop: CancellationToken) {
        info!(
            target: "sc.monitor",
            device = %self.config.name,
            notify_port = %self.config.notify_port_path,
            "waiting_for_device"
        );
        // 启动时立即尝试打开一次
        let mut pending = Some(Input::RetryElapsed);
        while self.state != MonitorState::Stopped {
            let input = match pending.take() {
                Some(input) => input,
                None => self.next_input(&stop).await,
            };
            pending = self.step(input, &stop).await;
        }
        info!(target: "sc.monitor", device = %self.config.name, "monitor_stopped");
    }

    async fn step(&mut self, input: Input, stop: &CancellationToken) -> Option<Input> {
        let event = input.event();
        let transition = transition(self.state, event);
        let mut input = Some(input);
        let mut follow_up = None;
        for action in transition.actions {
            if let Some(next) = self.apply(*action, &mut input, stop).await {
                follow_up = Some(next);
            }
        }
        // 未被接管的会话不能泄漏
        if let Some(Input::Opened(opened)) = input {
            opened.session.close().await;
        }
        if transition.next != self.state {
            debug!(
                target: "sc.monitor",
                device = %self.config.name,
                from = ?self.state,
                to = ?transition.next,
                event = ?event,
                "monitor_transition"
            );
        }
        self.state = transition.next;
        follow_up
    }

    async fn next_input(&mut self, stop: &CancellationToken) -> Input {
        match self.active.as_mut() {
            Some(active) => wait_ready(active, stop).await,
            None => {
                let Some(deadline) = self.retry_at.take() else {
                    stop.cancelled().await;
                    return Input::Stop;
                };
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => Input::Stop,
                    _ = tokio::time::sleep_until(deadline) => Input::RetryElapsed,
                }
            }
        }
    }

    async fn apply(
        &mut self,
        action: Action,
        input: &mut Option<Input>,
        stop: &CancellationToken,
    ) -> Option<Input> {
        match action {
            Action::AttemptOpen => return Some(self.attempt_open(stop).await),
            Action::MarkReady => {
                if let Some(Input::Opened(opened)) = input.take() {
                    self.mark_ready(opened);
                }
            }
            Action::QueryBalance => self.query_balance().await,
            Action::UpdateBalance => {
                if let Some(Input::Ussd(reply)) = input.take() {
                    self.update_balance(reply);
                }
            }
            Action::ForwardMessage => {
                if let Some(Input::Incoming(payload)) = input.take() {
                    self.forward(payload).await;
                }
            }
            Action::CloseSession => self.close_session().await,
            Action::ResetStatus => self.reset_status(),
            Action::ScheduleRetry => {
                if self.state == MonitorState::Ready {
                    info!(
                        target: "sc.monitor",
                        device = %self.config.name,
                        notify_port = %self.config.notify_port_path,
                        "waiting_for_device"
                    );
                }
                self.retry_at = Some(Instant::now() + self.settings.retry_interval);
            }
        }
        None
    }

    async fn attempt_open(&self, stop: &CancellationToken) -> Input {
        let result = tokio::select! {
            biased;
            _ = stop.cancelled() => return Input::Stop,
            result = self.driver.open(&self.config) => result,
        };
        match result {
            Ok(opened) => Input::Opened(opened),
            Err(err) => {
                record_open_failure();
                debug!(
                    target: "sc.monitor",
                    device = %self.config.name,
                    error = %err,
                    retry_in_secs = self.settings.retry_interval.as_secs(),
                    "device_open_failed"
                );
                Input::OpenFailed
            }
        }
    }

    fn mark_ready(&mut self, opened: OpenedSession) {
        let OpenedSession { session, events } = opened;
        let watched = session.clone();
        let watcher = tokio::spawn(async move { watched.watch().await });
        let period = self.settings.balance_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.active = Some(ActiveSession {
            session,
            events,
            watcher,
            ticker,
        });
        self.status
            .replace(DeviceStatus::ready(self.config.name.clone(), Utc::now()));
        record_device_connect();
        info!(
            target: "sc.monitor",
            device = %self.config.name,
            notify_port = %self.config.notify_port_path,
            "device_ready"
        );
    }

    async fn query_balance(&self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        record_balance_query();
        if let Err(err) = active
            .session
            .send_balance_query(&self.config.balance_ussd)
            .await
        {
            warn!(target: "sc.monitor", device = %self.config.name, error = %err, "balance_query_failed");
        }
    }

    fn update_balance(&self, reply: String) {
        record_balance_reply();
        debug!(target: "sc.monitor", device = %self.config.name, balance = %reply, "balance_updated");
        self.status.replace(self.status.current().with_balance(reply));
    }

    async fn forward(&self, payload: SmsPayload) {
        let id = match self.ids.generate() {
            Ok(id) => id,
            Err(err) => {
                record_id_failure();
                warn!(
                    target: "sc.monitor",
                    device = %self.config.name,
                    address = %payload.address,
                    error = %err,
                    "message_skipped"
                );
                let _ = self.faults.send(DeviceFault {
                    device: self.config.name.clone(),
                    error: MonitorError::Identifier(err),
                });
                return;
            }
        };
        let message = Message::captured(id, self.config.name.clone(), payload);
        record_message_captured();
        info!(
            target: "sc.monitor",
            device = %self.config.name,
            message_id = %message.id,
            address = %message.payload.address,
            "message_captured"
        );
        if self.messages.send(message).await.is_err() {
            warn!(target: "sc.monitor", device = %self.config.name, "fan_in_closed");
        }
    }

    async fn close_session(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.watcher.abort();
        active.session.close().await;
        // 驱动已上报但尚未处理的短信照常转发
        while let Ok(event) = active.events.try_recv() {
            if let SessionEvent::Incoming(payload) = event {
                self.forward(payload).await;
            }
        }
    }

    fn reset_status(&self) {
        self.status
            .replace(DeviceStatus::disconnected(self.config.name.clone()));
        record_device_disconnect();
        info!(
            target: "sc.monitor",
            device = %self.config.name,
            notify_port = %self.config.notify_port_path,
            "device_disconnected"
        );
    }
}

async fn wait_ready(active: &mut ActiveSession, stop: &CancellationToken) -> Input {
    let ActiveSession {
        session,
        events,
        watcher,
        ticker,
    } = active;
    tokio::select! {
        biased;
        _ = stop.cancelled() => Input::Stop,
        event = events.recv() => match event {
            Some(SessionEvent::UssdReply(reply)) => Input::Ussd(reply),
            Some(SessionEvent::Incoming(payload)) => Input::Incoming(payload),
            None => Input::SessionClosed,
        },
        _ = session.closed() => Input::SessionClosed,
        _ = watcher => Input::LinkLost,
        _ = ticker.tick() => Input::BalanceTick,
    }
}
