use async_trait::async_trait;
use base64::Engine;
use domain::DeviceConfig;
use sc_device::SimulatedDriver;
use sc_fleet::{FleetConfig, FleetSupervisor};
use sc_monitor::OsRngIdGenerator;
use sc_publish::{
    MESSAGES_TOPIC, MessagePublisher, PublishError, PublishStats, PublisherConfig, run_publisher,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn config(name: &str) -> DeviceConfig {
    DeviceConfig {
        name: name.to_string(),
        command_port_path: format!("/dev/{}-cmd", name),
        notify_port_path: format!("/dev/{}-notify", name),
        balance_ussd: "*100#".to_string(),
    }
}

#[derive(Default)]
struct RecordingBroker {
    published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingBroker {
    fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.lock().expect("lock").clone()
    }
}

#[async_trait]
impl MessagePublisher for RecordingBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let body = serde_json::from_slice(&payload).expect("json");
        self.published
            .lock()
            .expect("lock")
            .push((topic.to_string(), body));
        Ok(())
    }
}

fn start(
    driver: &SimulatedDriver,
    names: &[&str],
    broker: Arc<RecordingBroker>,
) -> (
    FleetSupervisor,
    tokio::task::JoinHandle<PublishStats>,
    CancellationToken,
) {
    let (fleet, channels) = FleetSupervisor::start(
        names.iter().map(|name| config(name)).collect(),
        Arc::new(driver.clone()),
        Arc::new(OsRngIdGenerator),
        FleetConfig::default(),
    )
    .expect("start");
    let abandon = CancellationToken::new();
    let publishing = tokio::spawn(run_publisher(
        channels.messages,
        broker,
        PublisherConfig::default(),
        abandon.clone(),
    ));
    (fleet, publishing, abandon)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn captured_sms_reaches_messages_topic() {
    let driver = SimulatedDriver::new();
    let broker = Arc::new(RecordingBroker::default());
    let (fleet, publishing, _abandon) = start(&driver, &["A"], broker.clone());

    let modem = driver.wait_for_session("A", 1).await.expect("session");
    settle().await;
    modem.deliver_sms("+1555", "hello").await.expect("sms");
    settle().await;

    let published = broker.published();
    assert_eq!(published.len(), 1);
    let (topic, body) = &published[0];
    assert_eq!(topic, MESSAGES_TOPIC);
    assert_eq!(body["origin"], "A");
    assert_eq!(body["payload"]["address"], "+1555");
    assert_eq!(body["payload"]["text"], "hello");
    let id = base64::engine::general_purpose::STANDARD
        .decode(body["id"].as_str().expect("id string"))
        .expect("base64");
    assert_eq!(id.len(), 16);
    assert!(id.iter().any(|byte| *byte != 0));

    fleet.shutdown().await;
    let stats = publishing.await.expect("publisher task");
    assert_eq!(
        stats,
        PublishStats {
            published: 1,
            dropped: 0
        }
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_publishes_everything_already_captured() {
    let driver = SimulatedDriver::new();
    let broker = Arc::new(RecordingBroker::default());
    let (fleet, publishing, abandon) = start(&driver, &["A", "B"], broker.clone());
    let a = driver.wait_for_session("A", 1).await.expect("A");
    let b = driver.wait_for_session("B", 1).await.expect("B");
    settle().await;

    for n in 0..5 {
        a.deliver_sms("+1", &format!("a{n}")).await.expect("sms");
        b.deliver_sms("+2", &format!("b{n}")).await.expect("sms");
    }
    // 不让出调度：短信仍在会话事件队列中时开始关停
    fleet.shutdown().await;

    let stats = publishing.await.expect("publisher task");
    assert!(!abandon.is_cancelled());
    assert_eq!(
        stats,
        PublishStats {
            published: 10,
            dropped: 0
        }
    );

    let texts_from = |origin: &str| {
        broker
            .published()
            .into_iter()
            .filter(|(_, body)| body["origin"] == origin)
            .map(|(_, body)| body["payload"]["text"].as_str().expect("text").to_string())
            .collect::<Vec<_>>()
    };
    assert_eq!(texts_from("A"), vec!["a0", "a1", "a2", "a3", "a4"]);
    assert_eq!(texts_from("B"), vec!["b0", "b1", "b2", "b3", "b4"]);
    let mut ids = broker
        .published()
        .into_iter()
        .map(|(_, body)| body["id"].as_str().expect("id").to_string())
        .collect::<Vec<_>>();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);
}
