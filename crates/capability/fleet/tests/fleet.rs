use domain::DeviceConfig;
use sc_device::SimulatedDriver;
use sc_fleet::{FleetConfig, FleetError, FleetSupervisor};
use sc_monitor::OsRngIdGenerator;
use std::sync::Arc;
use std::time::Duration;

fn config(name: &str) -> DeviceConfig {
    DeviceConfig {
        name: name.to_string(),
        command_port_path: format!("/dev/{}-cmd", name),
        notify_port_path: format!("/dev/{}-notify", name),
        balance_ussd: "*100#".to_string(),
    }
}

fn start(
    driver: &SimulatedDriver,
    names: &[&str],
    capacity: usize,
) -> Result<(FleetSupervisor, sc_fleet::FleetChannels), FleetError> {
    FleetSupervisor::start(
        names.iter().map(|name| config(name)).collect(),
        Arc::new(driver.clone()),
        Arc::new(OsRngIdGenerator),
        FleetConfig {
            channel_capacity: capacity,
            ..FleetConfig::default()
        },
    )
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn refuses_to_start_without_devices() {
    let driver = SimulatedDriver::new();
    assert!(matches!(
        start(&driver, &[], 200).err(),
        Some(FleetError::NoDevicesConfigured)
    ));
}

#[tokio::test(start_paused = true)]
async fn refuses_duplicate_device_names() {
    let driver = SimulatedDriver::new();
    match start(&driver, &["wolfram", "Wolfram"], 200).err() {
        Some(FleetError::DuplicateDevice(name)) => assert_eq!(name, "Wolfram"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn failing_device_does_not_affect_siblings() {
    let driver = SimulatedDriver::new();
    driver.set_available("B", false);
    let (fleet, mut channels) = start(&driver, &["A", "B"], 200).expect("start");
    let status = fleet.status();

    let modem = driver.wait_for_session("A", 1).await.expect("session");
    tokio::time::sleep(Duration::from_secs(25)).await;

    let snapshot = status.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].name, "A");
    assert!(snapshot[0].is_ready());
    assert_eq!(snapshot[1].name, "B");
    assert!(!snapshot[1].is_ready());
    assert_eq!(driver.open_attempts("B"), 3);

    assert!(status.get("a").expect("case-insensitive lookup").is_ready());
    assert!(status.get("missing").is_none());

    modem.deliver_sms("+1555", "hello").await.expect("sms");
    let message = channels.messages.recv().await.expect("message");
    assert_eq!(message.origin, "A");
    assert_eq!(message.payload.text, "hello");

    fleet.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_drains_enqueued_messages_then_closes() {
    let driver = SimulatedDriver::new();
    let (fleet, mut channels) = start(&driver, &["A", "B"], 200).expect("start");
    let a = driver.wait_for_session("A", 1).await.expect("A");
    let b = driver.wait_for_session("B", 1).await.expect("B");
    settle().await;

    for n in 0..3 {
        a.deliver_sms("+1", &format!("a{n}")).await.expect("sms");
        b.deliver_sms("+2", &format!("b{n}")).await.expect("sms");
    }
    settle().await;

    fleet.shutdown().await;
    assert!(a.is_released());
    assert!(b.is_released());

    let mut from_a = Vec::new();
    let mut from_b = Vec::new();
    while let Some(message) = channels.messages.recv().await {
        match message.origin.as_str() {
            "A" => from_a.push(message.payload.text),
            _ => from_b.push(message.payload.text),
        }
    }
    assert_eq!(from_a, vec!["a0", "a1", "a2"]);
    assert_eq!(from_b, vec!["b0", "b1", "b2"]);
    assert!(channels.faults.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn full_channel_throttles_monitor_without_loss() {
    let driver = SimulatedDriver::new();
    let (fleet, mut channels) = start(&driver, &["A"], 2).expect("start");
    let modem = driver.wait_for_session("A", 1).await.expect("session");
    settle().await;

    for n in 0..6 {
        modem.deliver_sms("+1", &format!("sms {n}")).await.expect("sms");
    }
    settle().await;

    for n in 0..6 {
        let message = channels.messages.recv().await.expect("message");
        assert_eq!(message.payload.text, format!("sms {n}"));
    }
    fleet.shutdown().await;
    assert!(channels.messages.recv().await.is_none());
}
