//! 应用运行配置与设备配置文件加载。

mod devices;

pub use devices::{load_device_config, load_device_configs};

use std::collections::BTreeSet;
use std::env;
use tracing::warn;

/// 关停等待时长的下限（秒）。
const MIN_SHUTDOWN_TIMEOUT_SECONDS: u64 = 10;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("unable to read {0}: {1}")]
    Io(String, String),
    #[error("malformed device config {0}: {1}")]
    Malformed(String, String),
    #[error("unsupported device name {0}")]
    UnsupportedName(String),
    #[error("duplicate device name {0}")]
    DuplicateName(String),
    #[error("no device configs found in {0}")]
    NoDevices(String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub modem_dir: String,
    pub supported_names: BTreeSet<String>,
    pub channel_capacity: usize,
    pub device_check_interval_seconds: u64,
    pub balance_check_interval_seconds: u64,
    pub publish_enabled: bool,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub publish_max_retries: u32,
    pub publish_backoff_ms: u64,
    pub publish_timeout_ms: u64,
    pub shutdown_timeout_seconds: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("SC_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:5051".to_string());
        let modem_dir = env::var("SC_MODEM_DIR").unwrap_or_else(|_| "modems".to_string());
        let supported_names = parse_names(
            &env::var("SC_SUPPORTED_NAMES").unwrap_or_else(|_| "wolfram,wikipedia".to_string()),
        );
        if supported_names.is_empty() {
            return Err(ConfigError::Invalid(
                "SC_SUPPORTED_NAMES".to_string(),
                "empty".to_string(),
            ));
        }
        let channel_capacity = read_u64_with_default("SC_CHANNEL_CAPACITY", 200)?;
        if channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "SC_CHANNEL_CAPACITY".to_string(),
                "0".to_string(),
            ));
        }
        let device_check_interval_seconds =
            read_positive_u64("SC_DEVICE_CHECK_INTERVAL_SECONDS", 10)?;
        let balance_check_interval_seconds =
            read_positive_u64("SC_BALANCE_CHECK_INTERVAL_SECONDS", 60)?;
        let publish_enabled = read_bool_with_default("SC_PUBLISH", true);
        let mqtt_host = env::var("SC_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("SC_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("SC_MQTT_USERNAME");
        let mqtt_password = read_optional("SC_MQTT_PASSWORD");
        let publish_max_retries = read_u64_with_default("SC_PUBLISH_MAX_RETRIES", 2)?;
        let publish_max_retries = u32::try_from(publish_max_retries).map_err(|_| {
            ConfigError::Invalid(
                "SC_PUBLISH_MAX_RETRIES".to_string(),
                publish_max_retries.to_string(),
            )
        })?;
        let publish_backoff_ms = read_u64_with_default("SC_PUBLISH_BACKOFF_MS", 200)?;
        let publish_timeout_ms = read_positive_u64("SC_PUBLISH_TIMEOUT_MS", 5000)?;
        // 默认关停等待至少覆盖一条消息的发布上界
        let message_bound_ms =
            publish_message_bound_ms(publish_max_retries, publish_backoff_ms, publish_timeout_ms);
        let shutdown_timeout_seconds = read_u64_with_default(
            "SC_SHUTDOWN_TIMEOUT_SECONDS",
            default_shutdown_timeout_seconds(message_bound_ms),
        )?;
        if shutdown_timeout_seconds.saturating_mul(1000) < message_bound_ms {
            warn!(
                target: "sc.config",
                shutdown_timeout_seconds,
                message_bound_ms,
                "shutdown_timeout_below_publish_bound"
            );
        }

        Ok(Self {
            http_addr,
            modem_dir,
            supported_names,
            channel_capacity: channel_capacity as usize,
            device_check_interval_seconds,
            balance_check_interval_seconds,
            publish_enabled,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            publish_max_retries,
            publish_backoff_ms,
            publish_timeout_ms,
            shutdown_timeout_seconds,
        })
    }
}

/// 单条消息的发布上界：(重试 + 1) * 超时 + 重试 * 退避。
fn publish_message_bound_ms(max_retries: u32, backoff_ms: u64, timeout_ms: u64) -> u64 {
    let retries = u64::from(max_retries);
    timeout_ms
        .saturating_mul(retries.saturating_add(1))
        .saturating_add(backoff_ms.saturating_mul(retries))
}

fn default_shutdown_timeout_seconds(message_bound_ms: u64) -> u64 {
    message_bound_ms
        .div_ceil(1000)
        .max(MIN_SHUTDOWN_TIMEOUT_SECONDS)
}

fn parse_names(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

/// 间隔类配置不允许为 0。
fn read_positive_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match read_u64_with_default(key, default)? {
        0 => Err(ConfigError::Invalid(key.to_string(), "0".to_string())),
        value => Ok(value),
    }
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
