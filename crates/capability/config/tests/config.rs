use sc_config::{AppConfig, ConfigError, load_device_config, load_device_configs};
use std::collections::BTreeSet;
use std::path::PathBuf;

fn supported() -> BTreeSet<String> {
    ["wolfram", "wikipedia"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sc-config-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create dir");
    dir
}

fn device_json(name: &str) -> String {
    format!(
        r#"{{"name":"{}","command_port_path":"/dev/ttyUSB0","notify_port_path":"/dev/ttyUSB2","balance_ussd":"*100#"}}"#,
        name
    )
}

#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("SC_HTTP_ADDR", "127.0.0.1:5052");
        std::env::set_var("SC_SUPPORTED_NAMES", "wolfram, wikipedia");
        std::env::set_var("SC_DEVICE_CHECK_INTERVAL_SECONDS", "3");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:5052");
    assert_eq!(config.supported_names, supported());
    assert_eq!(config.device_check_interval_seconds, 3);
    assert_eq!(config.balance_check_interval_seconds, 60);
    assert_eq!(config.channel_capacity, 200);
    assert_eq!(config.shutdown_timeout_seconds, 16);
}

#[test]
fn load_configs_skips_invalid_files() {
    let dir = scratch_dir("mixed");
    std::fs::write(dir.join("a.json"), device_json("wolfram")).expect("write");
    std::fs::write(dir.join("b.json"), device_json("unknown")).expect("write");
    std::fs::write(dir.join("c.json"), "{ not json").expect("write");
    std::fs::write(dir.join("d.json"), device_json("wolfram")).expect("write");
    std::fs::write(dir.join("e.txt"), device_json("wikipedia")).expect("write");
    std::fs::write(dir.join("f.json"), device_json("wikipedia")).expect("write");

    let configs = load_device_configs(&dir, &supported()).expect("configs");
    let names = configs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["wolfram", "wikipedia"]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unsupported_name_is_rejected() {
    let dir = scratch_dir("unsupported");
    let path = dir.join("x.json");
    std::fs::write(&path, device_json("bing")).expect("write");

    let err = load_device_config(&path, &supported()).expect_err("rejected");
    assert!(matches!(err, ConfigError::UnsupportedName(name) if name == "bing"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn empty_dir_has_no_devices() {
    let dir = scratch_dir("empty");
    let err = load_device_configs(&dir, &supported()).expect_err("no devices");
    assert!(matches!(err, ConfigError::NoDevices(_)));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_dir_is_io_error() {
    let dir = std::env::temp_dir().join("sc-config-definitely-missing-dir");
    let err = load_device_configs(&dir, &supported()).expect_err("missing");
    assert!(matches!(err, ConfigError::Io(_, _)));
}
