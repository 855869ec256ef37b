use crate::{MessagePublisher, PublishError};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, QoS};
use std::time::Duration;
use tracing::{debug, info, warn};

/// MQTT 发布配置。
#[derive(Debug, Clone)]
pub struct MqttPublisherConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// MQTT 发布器（至少一次语义，消费者按 id 去重）。
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// 创建客户端并启动事件循环任务；`disconnect` 后事件循环退出。
    pub fn connect(
        config: MqttPublisherConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), PublishError> {
        let client_id = format!("sc-client-{}", uuid::Uuid::new_v4());
        info!(
            target: "sc.publish",
            client_id = %client_id,
            host = %config.host,
            port = config.port,
            "mqtt_connecting"
        );
        let mut options = MqttOptions::new(client_id, config.host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }
        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        debug!(target: "sc.publish", "mqtt_eventloop_stopped");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(target: "sc.publish", "mqtt eventloop error: {}", err);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
        Ok((Self { client }, handle))
    }

    pub async fn disconnect(&self) -> Result<(), PublishError> {
        self.client
            .disconnect()
            .await
            .map_err(|err| PublishError::Broker(err.to_string()))
    }
}

#[async_trait]
impl MessagePublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        debug!(target: "sc.publish", topic = %topic, payload_size = payload.len(), "mqtt_publish");
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|err| PublishError::Broker(err.to_string()))
    }
}
