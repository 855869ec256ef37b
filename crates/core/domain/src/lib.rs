pub mod device;
pub mod message;

pub use device::{DeviceConfig, DeviceState, DeviceStatus};
pub use message::{Message, MessageId, SmsPayload};
