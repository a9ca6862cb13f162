use std::time::Duration;

use session_exec::{config::GlobalConfig, AppError};

fn sample_toml(storage_root: &str) -> String {
    format!(
        r#"
http_host = "0.0.0.0"
http_port = 9090
storage_root = '{storage_root}'

[interpreter]
program = "python3.12"
args = ["-I"]

[timeouts]
execution_ms = 350
session_idle_seconds = 60
sweep_interval_seconds = 5
"#
    )
}

#[test]
fn parses_valid_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().to_str().expect("utf8 path");
    let config = GlobalConfig::from_toml_str(&sample_toml(root)).expect("config parses");

    assert_eq!(config.http_port, 9090);
    assert_eq!(config.interpreter.program, "python3.12");
    assert_eq!(config.interpreter.args, vec!["-I".to_owned()]);
    assert_eq!(config.storage_root(), temp.path());
    assert_eq!(config.execution_timeout(), Duration::from_millis(350));
    assert_eq!(config.session_idle(), Duration::from_secs(60));
    assert_eq!(config.sweep_interval(), Duration::from_secs(5));
    assert_eq!(
        config.bind_addr().expect("bind addr").to_string(),
        "0.0.0.0:9090"
    );
}

#[test]
fn empty_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("empty config parses");

    assert_eq!(config, GlobalConfig::default());
    assert_eq!(config.http_host, "127.0.0.1");
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.interpreter.program, "python3");
    assert!(config.interpreter.args.is_empty());
    assert_eq!(config.execution_timeout(), Duration::from_secs(2));
    assert_eq!(config.session_idle(), Duration::from_secs(300));
    assert_eq!(config.sweep_interval(), Duration::from_secs(30));
    assert_eq!(
        config.storage_root(),
        std::env::temp_dir().join("python-sessions")
    );
}

#[test]
fn partial_timeouts_fill_in_defaults() {
    let config = GlobalConfig::from_toml_str("[timeouts]\nexecution_ms = 100\n")
        .expect("config parses");
    assert_eq!(config.timeouts.execution_ms, 100);
    assert_eq!(config.timeouts.session_idle_seconds, 300);
    assert_eq!(config.timeouts.sweep_interval_seconds, 30);
}

#[test]
fn rejects_zero_execution_timeout() {
    let result = GlobalConfig::from_toml_str("[timeouts]\nexecution_ms = 0\n");
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("execution_ms")));
}

#[test]
fn rejects_zero_sweep_interval() {
    let result = GlobalConfig::from_toml_str("[timeouts]\nsweep_interval_seconds = 0\n");
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("sweep_interval")));
}

#[test]
fn rejects_empty_interpreter() {
    let result = GlobalConfig::from_toml_str("[interpreter]\nprogram = \"  \"\n");
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("interpreter.program")));
}

#[test]
fn rejects_non_ip_host() {
    let result = GlobalConfig::from_toml_str("http_host = \"localhost:80\"\n");
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("http_host")));
}

#[test]
fn rejects_malformed_toml() {
    let result = GlobalConfig::from_toml_str("http_port = \"not a number\"");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn load_from_missing_path_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let result = GlobalConfig::load_from_path(temp.path().join("absent.toml"));
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("failed to read config")));
}
