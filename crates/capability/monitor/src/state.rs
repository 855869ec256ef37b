//! 设备监控状态转移表：(状态, 事件) → (下一状态, 动作)。
//!
//! 表本身不涉及定时器和任务，`DeviceMonitor` 负责产生事件并执行动作。

/// 监控状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorState {
    Disconnected,
    Ready,
    /// 终止态（监管者关停）。
    Stopped,
}

/// 驱动状态机的事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorEvent {
    /// 重连定时器到期（启动时立即触发一次）。
    RetryElapsed,
    OpenSucceeded,
    OpenFailed,
    /// `watch()` 返回。
    LinkLost,
    SessionClosed,
    BalanceTick,
    UssdReply,
    Incoming,
    Stop,
}

/// 转移的副作用，按顺序执行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    AttemptOpen,
    /// 记录在线起点、清空余额、启动 watcher 与事件循环。
    MarkReady,
    QueryBalance,
    UpdateBalance,
    ForwardMessage,
    CloseSession,
    ResetStatus,
    ScheduleRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: MonitorState,
    pub actions: &'static [Action],
}

pub fn transition(state: MonitorState, event: MonitorEvent) -> Transition {
    use Action::*;
    use MonitorEvent::*;
    use MonitorState::*;

    let (next, actions): (MonitorState, &'static [Action]) = match (state, event) {
        (Stopped, _) => (Stopped, &[]),
        (Disconnected, Stop) => (Stopped, &[]),
        (Ready, Stop) => (Stopped, &[CloseSession, ResetStatus]),

        (Disconnected, RetryElapsed) => (Disconnected, &[AttemptOpen]),
        (Disconnected, OpenSucceeded) => (Ready, &[MarkReady, QueryBalance]),
        (Disconnected, OpenFailed) => (Disconnected, &[ScheduleRetry]),
        // 已断开时残留的会话通知
        (Disconnected, LinkLost | SessionClosed | BalanceTick | UssdReply | Incoming) => {
            (Disconnected, &[])
        }

        (Ready, LinkLost | SessionClosed) => {
            (Disconnected, &[CloseSession, ResetStatus, ScheduleRetry])
        }
        (Ready, BalanceTick) => (Ready, &[QueryBalance]),
        (Ready, UssdReply) => (Ready, &[UpdateBalance]),
        (Ready, Incoming) => (Ready, &[ForwardMessage]),
        // Ready 时不会再发起打开
        (Ready, RetryElapsed | OpenSucceeded | OpenFailed) => (Ready, &[]),
    };
    Transition { next, actions }
}
