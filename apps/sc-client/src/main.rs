//! 调制解调器监控进程：设备群监管、短信发布与只读状态接口。

mod handlers;
mod middleware;
mod routes;
mod utils;

use sc_config::{AppConfig, load_device_configs};
use sc_device::{DeviceDriver, NoopDriver};
use sc_fleet::{FleetConfig, FleetStatus, FleetSupervisor, log_faults};
use sc_monitor::{MonitorConfig, OsRngIdGenerator};
use sc_publish::{
    MessagePublisher, MqttPublisher, MqttPublisherConfig, NoopPublisher, PublisherConfig,
    run_publisher,
};
use sc_telemetry::{TelemetryMetrics, init_tracing, metrics};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub fleet: FleetStatus,
    pub metrics: &'static TelemetryMetrics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 设备配置：每设备一个 JSON 文件，启动时加载一次
    let devices = load_device_configs(Path::new(&config.modem_dir), &config.supported_names)?;

    // AT 驱动由外部提供；占位驱动让监控停留在重试循环
    let driver: Arc<dyn DeviceDriver> = Arc::new(NoopDriver);
    let (fleet, channels) = FleetSupervisor::start(
        devices,
        driver,
        Arc::new(OsRngIdGenerator),
        FleetConfig {
            channel_capacity: config.channel_capacity,
            monitor: MonitorConfig {
                retry_interval: Duration::from_secs(config.device_check_interval_seconds),
                balance_interval: Duration::from_secs(config.balance_check_interval_seconds),
            },
        },
    )?;
    let faults = tokio::spawn(log_faults(channels.faults));

    // 发布链路：MQTT 或空发布器
    let mut mqtt = None;
    let publisher: Arc<dyn MessagePublisher> = if config.publish_enabled {
        let (client, eventloop) = MqttPublisher::connect(MqttPublisherConfig {
            host: config.mqtt_host.clone(),
            port: config.mqtt_port,
            username: config.mqtt_username.clone(),
            password: config.mqtt_password.clone(),
        })?;
        mqtt = Some((client.clone(), eventloop));
        Arc::new(client)
    } else {
        info!(target: "sc.publish", "publish_disabled");
        Arc::new(NoopPublisher)
    };
    let abandon = CancellationToken::new();
    let mut publishing = tokio::spawn(run_publisher(
        channels.messages,
        publisher,
        PublisherConfig {
            max_retries: config.publish_max_retries,
            backoff: Duration::from_millis(config.publish_backoff_ms),
            attempt_timeout: Duration::from_millis(config.publish_timeout_ms),
        },
        abandon.clone(),
    ));

    let app = routes::create_router(AppState {
        fleet: fleet.status(),
        metrics: metrics(),
    });
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "sc.api", addr = %config.http_addr, "http_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 先停监控（关闭会话），再等待发布任务排空通道
    fleet.shutdown().await;
    // 期限到达后放弃剩余消息，发布任务逐条记录 message_dropped 后返回
    let drain_timeout = Duration::from_secs(config.shutdown_timeout_seconds);
    let joined = tokio::select! {
        joined = &mut publishing => joined,
        _ = tokio::time::sleep(drain_timeout) => {
            warn!(
                target: "sc.publish",
                timeout_secs = config.shutdown_timeout_seconds,
                "publisher_drain_timeout"
            );
            abandon.cancel();
            publishing.await
        }
    };
    match joined {
        Ok(stats) => info!(
            target: "sc.publish",
            published = stats.published,
            dropped = stats.dropped,
            "shutdown_drained"
        ),
        Err(err) => warn!(target: "sc.publish", error = %err, "publisher_task_failed"),
    }
    if let Err(err) = faults.await {
        warn!(target: "sc.fleet", error = %err, "fault_logger_failed");
    }
    if let Some((client, eventloop)) = mqtt {
        if let Err(err) = client.disconnect().await {
            warn!(target: "sc.publish", error = %err, "mqtt_disconnect_failed");
        }
        if tokio::time::timeout(drain_timeout, eventloop).await.is_err() {
            warn!(target: "sc.publish", "mqtt_eventloop_timeout");
        }
    }
    info!(target: "sc.api", "shutdown_complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target: "sc.api", error = %err, "signal_listener_failed");
        std::future::pending::<()>().await;
    }
    info!(target: "sc.api", "shutdown_requested");
}
