use domain::{DeviceConfig, SmsPayload};
use sc_device::{DeviceDriver, DeviceError, SessionEvent, SimulatedDriver};

fn config(name: &str) -> DeviceConfig {
    DeviceConfig {
        name: name.to_string(),
        command_port_path: format!("/dev/{}-cmd", name),
        notify_port_path: format!("/dev/{}-notify", name),
        balance_ussd: "*100#".to_string(),
    }
}

#[tokio::test]
async fn open_fails_requested_times() {
    let driver = SimulatedDriver::new();
    driver.fail_next_opens("A", 2);

    assert!(matches!(
        driver.open(&config("A")).await.err(),
        Some(DeviceError::Unavailable(_))
    ));
    assert!(driver.open(&config("A")).await.is_err());
    let opened = driver.open(&config("A")).await.expect("third open");

    assert_eq!(driver.open_attempts("A"), 3);
    assert_eq!(driver.open_sessions("A"), 1);
    opened.session.close().await;
    assert_eq!(driver.open_sessions("A"), 0);
}

#[tokio::test]
async fn close_is_idempotent() {
    let driver = SimulatedDriver::new();
    let opened = driver.open(&config("A")).await.expect("open");
    let modem = driver.wait_for_session("A", 1).await.expect("session");

    opened.session.close().await;
    opened.session.close().await;

    assert!(modem.is_released());
    assert_eq!(driver.open_sessions("A"), 0);
    assert!(matches!(
        opened.session.send_balance_query("*100#").await,
        Err(DeviceError::Closed)
    ));
}

#[tokio::test]
async fn modem_handle_feeds_notification_surface() {
    let driver = SimulatedDriver::new();
    let mut opened = driver.open(&config("A")).await.expect("open");
    let modem = driver.wait_for_session("A", 1).await.expect("session");

    modem.deliver_sms("+1555", "hello").await.expect("sms");
    modem.reply_ussd("Balance: 10").await.expect("ussd");
    opened
        .session
        .send_balance_query("*100#")
        .await
        .expect("query");

    assert_eq!(
        opened.events.recv().await,
        Some(SessionEvent::Incoming(SmsPayload::new("+1555", "hello")))
    );
    assert_eq!(
        opened.events.recv().await,
        Some(SessionEvent::UssdReply("Balance: 10".to_string()))
    );
    assert_eq!(modem.balance_queries(), vec!["*100#".to_string()]);

    modem.unplug();
    opened.session.watch().await;
}

#[tokio::test]
async fn devices_are_tracked_independently() {
    let driver = SimulatedDriver::new();
    driver.set_available("B", false);

    let _a = driver.open(&config("A")).await.expect("open A");
    assert!(driver.open(&config("B")).await.is_err());

    assert_eq!(driver.open_sessions("A"), 1);
    assert_eq!(driver.open_sessions("B"), 0);
    assert_eq!(driver.max_open_sessions("A"), 1);
}
