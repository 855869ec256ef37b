//! # 消息发布
//!
//! 发布任务按 FIFO 排空汇聚通道，每条 `Message` 编码为 JSON 后发往固定主题
//! `messages`。单次尝试有超时，失败按固定退避有限重试，重试耗尽则记录并丢弃，
//! 排空循环在任何一条消息上的停留时间都有上界：
//!
//! ```text
//! (max_retries + 1) * attempt_timeout + max_retries * backoff
//! ```
//!
//! 通道关闭（所有监控退出）后循环结束并返回统计。关停期限到达时取消
//! `abandon`：正在发送的消息与通道中剩余的消息逐条以 `message_dropped` 记录并计数，
//! 不会无声丢失。

mod mqtt;

pub use mqtt::{MqttPublisher, MqttPublisherConfig};

use async_trait::async_trait;
use domain::Message;
use sc_telemetry::{record_message_dropped, record_message_published, record_publish_failure};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 下游消费者订阅的主题。
pub const MESSAGES_TOPIC: &str = "messages";

/// 发布错误。
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("encode error: {0}")]
    Encode(String),
    #[error("broker error: {0}")]
    Broker(String),
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
    #[error("publish abandoned at shutdown deadline")]
    Abandoned,
}

/// 消息代理发布抽象。
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// 空发布器（关闭发布时占位）。
#[derive(Debug, Default)]
pub struct NoopPublisher;

#[async_trait]
impl MessagePublisher for NoopPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        debug!(target: "sc.publish", topic = %topic, payload_size = payload.len(), "publish_skipped");
        Ok(())
    }
}

/// 重试参数。
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// 首次尝试之外的重试次数。
    pub max_retries: u32,
    pub backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(200),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl PublisherConfig {
    /// 单条消息在排空循环中停留时间的上界。
    pub fn message_bound(&self) -> Duration {
        self.attempt_timeout * self.max_retries.saturating_add(1) + self.backoff * self.max_retries
    }
}

/// 排空结束时的统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u64,
    pub dropped: u64,
}

/// 编码为下游约定的 JSON（id 为 16 字节的 base64 字符串）。
pub fn encode_message(message: &Message) -> Result<Vec<u8>, PublishError> {
    serde_json::to_vec(message).map_err(|err| PublishError::Encode(err.to_string()))
}

/// 带超时的有限重试，返回最后一次失败原因。
pub async fn publish_with_retry(
    publisher: &dyn MessagePublisher,
    topic: &str,
    payload: &[u8],
    config: &PublisherConfig,
) -> Result<(), PublishError> {
    let attempts = config.max_retries.saturating_add(1);
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(
            config.attempt_timeout,
            publisher.publish(topic, payload.to_vec()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(config.attempt_timeout)),
        };
        let err = match result {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        record_publish_failure();
        warn!(
            target: "sc.publish",
            topic = %topic,
            attempt,
            attempts,
            error = %err,
            "publish_failed"
        );
        if attempt >= attempts {
            return Err(err);
        }
        attempt += 1;
        tokio::time::sleep(config.backoff).await;
    }
}

/// 排空汇聚通道直到其关闭；`abandon` 取消后放弃剩余消息。
pub async fn run_publisher(
    mut messages: mpsc::Receiver<Message>,
    publisher: Arc<dyn MessagePublisher>,
    config: PublisherConfig,
    abandon: CancellationToken,
) -> PublishStats {
    let mut stats = PublishStats::default();
    loop {
        let message = tokio::select! {
            biased;
            _ = abandon.cancelled() => break,
            message = messages.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };
        let outcome = match encode_message(&message) {
            Ok(body) => tokio::select! {
                biased;
                _ = abandon.cancelled() => Err(PublishError::Abandoned),
                result = publish_with_retry(publisher.as_ref(), MESSAGES_TOPIC, &body, &config) => result,
            },
            Err(err) => Err(err),
        };
        match outcome {
            Ok(()) => {
                stats.published += 1;
                record_message_published();
                debug!(
                    target: "sc.publish",
                    message_id = %message.id,
                    origin = %message.origin,
                    "message_published"
                );
            }
            Err(err) => drop_message(&mut stats, &message, &err),
        }
    }
    if abandon.is_cancelled() {
        // 关闭后 recv 仍交付已缓冲的消息，随后返回 None
        messages.close();
        while let Some(message) = messages.recv().await {
            drop_message(&mut stats, &message, &PublishError::Abandoned);
        }
    }
    info!(
        target: "sc.publish",
        published = stats.published,
        dropped = stats.dropped,
        abandoned = abandon.is_cancelled(),
        "publisher_drained"
    );
    stats
}

fn drop_message(stats: &mut PublishStats, message: &Message, err: &PublishError) {
    stats.dropped += 1;
    record_message_dropped();
    warn!(
        target: "sc.publish",
        message_id = %message.id,
        origin = %message.origin,
        error = %err,
        "message_dropped"
    );
}
