//! 消息 ID 生成。

use domain::MessageId;
use rand_core::{OsRng, RngCore};

/// ID 生成错误（随机源不可用）。
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("randomness source unavailable: {0}")]
    Randomness(String),
}

/// 消息 ID 生成器。
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Result<MessageId, IdError>;
}

/// 基于系统随机源的 v4 ID：字节 6 高半字节为版本 4，字节 8 高两位为 `10`。
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRngIdGenerator;

impl IdGenerator for OsRngIdGenerator {
    fn generate(&self) -> Result<MessageId, IdError> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| IdError::Randomness(err.to_string()))?;
        let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Ok(MessageId::from_bytes(uuid.into_bytes()))
    }
}
