//! File-based loading tests.

use loginsvc_config::{ConfigError, ConfigLoader, LogFormat};
use std::io::Write;
use std::time::Duration;

fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_complete_toml() {
    let file = write_temp(
        ".toml",
        r#"
        [server]
        http_addr = "127.0.0.1:18081"
        grpc_addr = "127.0.0.1:18082"
        request_timeout_ms = 1500

        [rate_limit]
        burst = 10
        refill_interval_ms = 100

        [circuit_breaker]
        consecutive_failures = 3
        open_timeout_ms = 2000

        [lookup.records]
        ed = "a123456789"
        alice = "b987654321"

        [telemetry]
        service_name = "login-edge"
        environment = "staging"

        [telemetry.tracing]
        enabled = true
        otlp_endpoint = "http://collector:4317"
        sampling_ratio = 0.5

        [telemetry.logging]
        format = "pretty"
        "#,
    );

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();

    assert_eq!(config.server.grpc_addr, "127.0.0.1:18082");
    assert_eq!(config.server.request_timeout(), Duration::from_millis(1500));
    assert_eq!(config.rate_limit.to_config().burst, 10);
    let settings = config.circuit_breaker.to_settings("Name");
    assert_eq!(settings.consecutive_failures, 3);
    assert_eq!(settings.open_timeout, Duration::from_secs(2));
    assert_eq!(config.lookup.records.len(), 2);
    assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);

    let telemetry = config.telemetry.to_telemetry_config();
    assert_eq!(telemetry.service_name, "login-edge");
    assert_eq!(telemetry.tracing.otlp_endpoint, "http://collector:4317");
}

#[test]
fn test_load_json_by_extension() {
    let file = write_temp(".json", r#"{"server": {"http_addr": "127.0.0.1:3000"}}"#);

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
    assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    assert_eq!(config.server.grpc_addr, "0.0.0.0:8082");
}

#[test]
fn test_unknown_field_in_file_rejected() {
    let file = write_temp(".toml", "[rate_limit]\nburts = 3\n");

    let result = ConfigLoader::new().with_file(file.path());
    assert!(matches!(result, Err(ConfigError::TomlError(_))));
}

#[test]
fn test_unsupported_extension_rejected() {
    let file = write_temp(".yaml", "server: {}\n");

    let result = ConfigLoader::new().with_file(file.path());
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_file_then_env_override() {
    let file = write_temp(".toml", "[rate_limit]\nburst = 10\n");

    let config = ConfigLoader::new()
        .with_file(file.path())
        .unwrap()
        .with_env_prefix("LOADERTEST")
        .with_env_vars([("LOADERTEST__RATE_LIMIT__BURST", "20")])
        .load()
        .unwrap();
    assert_eq!(config.rate_limit.burst, 20);
}

#[test]
fn test_dotenv_file_feeds_environment() {
    let dotenv = write_temp(".env", "LOGINSVC_DOTENV_TEST__SERVER__HTTP_ADDR=127.0.0.1:4444\n");

    let config = ConfigLoader::new()
        .with_dotenv_file(dotenv.path())
        .unwrap()
        .with_env_prefix("LOGINSVC_DOTENV_TEST")
        .load()
        .unwrap();
    assert_eq!(config.server.http_addr, "127.0.0.1:4444");
}

#[test]
fn test_missing_dotenv_file() {
    let result = ConfigLoader::new().with_dotenv_file("/nonexistent/.env");
    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}
