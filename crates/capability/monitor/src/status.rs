//! 设备状态单元：监控任务整体替换写入，状态接口只读。

use domain::DeviceStatus;
use tokio::sync::watch;

/// 写端，仅由所属监控持有。
#[derive(Debug)]
pub struct StatusCell {
    tx: watch::Sender<DeviceStatus>,
}

impl StatusCell {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            tx: watch::channel(DeviceStatus::disconnected(name)).0,
        }
    }

    pub fn subscribe(&self) -> StatusReader {
        StatusReader {
            rx: self.tx.subscribe(),
        }
    }

    pub(crate) fn replace(&self, status: DeviceStatus) {
        self.tx.send_replace(status);
    }

    pub(crate) fn current(&self) -> DeviceStatus {
        self.tx.borrow().clone()
    }
}

/// 读端，可随意克隆。
#[derive(Debug, Clone)]
pub struct StatusReader {
    rx: watch::Receiver<DeviceStatus>,
}

impl StatusReader {
    pub fn snapshot(&self) -> DeviceStatus {
        self.rx.borrow().clone()
    }

    /// 等待状态满足条件；写端已释放时返回 None。
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&DeviceStatus) -> bool,
    ) -> Option<DeviceStatus> {
        self.rx
            .wait_for(predicate)
            .await
            .ok()
            .map(|status| status.clone())
    }
}
