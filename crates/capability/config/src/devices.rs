//! 设备配置文件加载（每个设备一个 JSON 文件）。

use crate::ConfigError;
use domain::DeviceConfig;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// 读取并校验单个设备配置文件。
pub fn load_device_config(
    path: &Path,
    supported_names: &BTreeSet<String>,
) -> Result<DeviceConfig, ConfigError> {
    let display = path.display().to_string();
    let raw =
        std::fs::read(path).map_err(|err| ConfigError::Io(display.clone(), err.to_string()))?;
    let config: DeviceConfig = serde_json::from_slice(&raw)
        .map_err(|err| ConfigError::Malformed(display, err.to_string()))?;
    if !supported_names.contains(&config.name) {
        return Err(ConfigError::UnsupportedName(config.name));
    }
    Ok(config)
}

/// 扫描目录下全部 `.json` 设备配置。
///
/// 单个文件无效时记录日志并跳过；没有任何有效配置时返回 `NoDevices`。
/// 结果按文件名排序，同名设备只保留第一个。
pub fn load_device_configs(
    dir: &Path,
    supported_names: &BTreeSet<String>,
) -> Result<Vec<DeviceConfig>, ConfigError> {
    let display = dir.display().to_string();
    let entries =
        std::fs::read_dir(dir).map_err(|err| ConfigError::Io(display.clone(), err.to_string()))?;
    let mut paths = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect::<Vec<_>>();
    paths.sort();

    let mut seen = BTreeSet::new();
    let mut configs = Vec::new();
    for path in paths {
        let config = match load_device_config(&path, supported_names) {
            Ok(config) => config,
            Err(err) => {
                warn!(target: "sc.config", path = %path.display(), error = %err, "device_config_skipped");
                continue;
            }
        };
        if !seen.insert(config.name.clone()) {
            let err = ConfigError::DuplicateName(config.name);
            warn!(target: "sc.config", path = %path.display(), error = %err, "device_config_skipped");
            continue;
        }
        info!(
            target: "sc.config",
            device = %config.name,
            command_port = %config.command_port_path,
            notify_port = %config.notify_port_path,
            "device_config_loaded"
        );
        configs.push(config);
    }

    if configs.is_empty() {
        return Err(ConfigError::NoDevices(display));
    }
    Ok(configs)
}
