use chrono::{Duration, Utc};
use domain::{DeviceConfig, DeviceStatus, Message, MessageId, SmsPayload};

fn sample_id() -> MessageId {
    MessageId::from_bytes([
        0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0x4d, 0xef, 0x80, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06,
        0x07,
    ])
}

#[test]
fn message_json_carries_expected_fields() {
    let message = Message::captured(sample_id(), "A", SmsPayload::new("+1555", "hello"));
    let json = serde_json::to_value(&message).expect("encode");

    assert_eq!(json["origin"], "A");
    assert_eq!(json["payload"]["address"], "+1555");
    assert_eq!(json["payload"]["text"], "hello");
    assert_eq!(json["id"], "EjRWeJq8Te+AAQIDBAUGBw==");
    assert!(json["timestamp"].as_str().expect("timestamp").contains('T'));
}

#[test]
fn message_id_bytes_survive_json() {
    let message = Message::captured(sample_id(), "A", SmsPayload::new("+1555", "hello"));
    let body = serde_json::to_vec(&message).expect("encode");
    let decoded: Message = serde_json::from_slice(&body).expect("decode");

    assert_eq!(decoded.id.as_bytes(), sample_id().as_bytes());
    assert_eq!(decoded, message);
}

#[test]
fn message_id_rejects_wrong_length() {
    let err = serde_json::from_str::<MessageId>("\"AAEC\"").expect_err("short id");
    assert!(err.to_string().contains("16 bytes"));
}

#[test]
fn message_id_nil_and_display() {
    assert!(MessageId::from_bytes([0; 16]).is_nil());
    assert!(!sample_id().is_nil());
    assert_eq!(
        sample_id().to_string(),
        "12345678-9abc-4def-8001-020304050607"
    );
}

#[test]
fn device_config_uses_file_field_names() {
    let raw = r#"{
        "name": "wolfram",
        "command_port_path": "/dev/ttyUSB0",
        "notify_port_path": "/dev/ttyUSB2",
        "balance_ussd": "*100#"
    }"#;
    let config: DeviceConfig = serde_json::from_str(raw).expect("config");
    assert_eq!(config.name, "wolfram");
    assert_eq!(config.notify_port_path, "/dev/ttyUSB2");
    assert_eq!(config.balance_ussd, "*100#");
}

#[test]
fn status_uptime_is_zero_until_ready() {
    let now = Utc::now();
    let idle = DeviceStatus::disconnected("A");
    assert!(!idle.is_ready());
    assert_eq!(idle.uptime_seconds(now), 0);
    assert!(idle.balance.is_empty());

    let ready = DeviceStatus::ready("A", now - Duration::seconds(42)).with_balance("10 RUB");
    assert!(ready.is_ready());
    assert_eq!(ready.uptime_seconds(now), 42);
    assert_eq!(ready.balance, "10 RUB");
}
