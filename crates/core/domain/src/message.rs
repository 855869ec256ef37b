use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 消息标识（16 字节，v4 布局）。
///
/// JSON 中以 base64 字符串承载原始字节，解码后逐字节一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId([u8; 16]);

impl MessageId {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_bytes(self.0).hyphenated())
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(self.0))
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        let bytes: [u8; 16] = bytes.try_into().map_err(|raw: Vec<u8>| {
            serde::de::Error::custom(format!("message id must be 16 bytes, got {}", raw.len()))
        })?;
        Ok(Self(bytes))
    }
}

/// 驱动上报的入站短信内容。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsPayload {
    /// 发送方号码。
    pub address: String,
    pub text: String,
}

impl SmsPayload {
    pub fn new(address: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            text: text.into(),
        }
    }
}

/// 跨越发布边界的短信事件。
///
/// 由设备监控在驱动上报短信时创建，之后不可变，经通道单一所有权传递。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// 产生该事件的设备名（下游分区/路由键）。
    pub origin: String,
    pub timestamp: DateTime<Utc>,
    pub payload: SmsPayload,
}

impl Message {
    /// 以当前时间作为捕获时间构造事件。
    pub fn captured(id: MessageId, origin: impl Into<String>, payload: SmsPayload) -> Self {
        Self {
            id,
            origin: origin.into(),
            timestamp: Utc::now(),
            payload,
        }
    }
}
