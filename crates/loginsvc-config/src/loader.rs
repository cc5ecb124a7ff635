//! Layered configuration loading.
//!
//! Later layers override earlier ones:
//! 1. Built-in defaults
//! 2. A TOML or JSON file, picked by extension
//! 3. `.env` entries, loaded into the process environment
//! 4. `PREFIX__SECTION__KEY` environment variables

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::{ConfigError, LogFormat, LoginsvcConfig, LookupBackend};

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "LOGINSVC";

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use loginsvc_config::ConfigLoader;
///
/// # fn main() -> Result<(), loginsvc_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("loginsvc.toml")?
///     .with_dotenv()?
///     .with_env_prefix("LOGINSVC")
///     .load()?;
///
/// println!("HTTP on {}", config.server.http_addr);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: LoginsvcConfig,
    env_prefix: Option<String>,
    env_vars: Option<Vec<(String, String)>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader seeded with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: LoginsvcConfig::default(),
            env_prefix: None,
            env_vars: None,
        }
    }

    /// Resets to the default configuration.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = LoginsvcConfig::default();
        self
    }

    /// Resets to the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = LoginsvcConfig::development();
        self
    }

    /// Resets to the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = LoginsvcConfig::production();
        self
    }

    /// Loads a `.toml` or `.json` file.
    ///
    /// The file replaces the current configuration; sections and fields it
    /// omits take their defaults.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Loads a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in `format` ("toml" or "json").
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Loads `.env` from the working directory into the process environment.
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::validation_error(format!(".env: {e}"))),
        }
    }

    /// Loads the given dotenv file into the process environment.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        dotenvy::from_path(path).map_err(|e| {
            if e.not_found() {
                ConfigError::file_not_found(path)
            } else {
                ConfigError::validation_error(format!("{}: {e}", path.display()))
            }
        })?;
        Ok(self)
    }

    /// Enables `PREFIX__SECTION__KEY` overrides.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Reads overrides from `vars` instead of the process environment.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Applies environment overrides and validates.
    pub fn load(mut self) -> Result<LoginsvcConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars = self
                .env_vars
                .take()
                .unwrap_or_else(|| env::vars().collect());
            self.apply_env_overrides(&prefix, vars)?;
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> LoginsvcConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<LoginsvcConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides(
        &mut self,
        prefix: &str,
        vars: Vec<(String, String)>,
    ) -> Result<(), ConfigError> {
        let scoped = format!("{prefix}__");
        for (key, value) in vars {
            if key.starts_with(&scoped) {
                self.apply_env_var(&key, &value, prefix)?;
            }
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let path = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "GRPC_ADDR"] => config.server.grpc_addr = value.to_string(),
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                config.server.request_timeout_ms = parse(key, value, "expected integer")?;
            }
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse(key, value, "expected integer")?;
            }

            ["RATE_LIMIT", "BURST"] => {
                config.rate_limit.burst = parse(key, value, "expected integer")?;
            }
            ["RATE_LIMIT", "REFILL_INTERVAL_MS"] => {
                config.rate_limit.refill_interval_ms = parse(key, value, "expected integer")?;
            }

            ["CIRCUIT_BREAKER", "CONSECUTIVE_FAILURES"] => {
                config.circuit_breaker.consecutive_failures =
                    parse(key, value, "expected integer")?;
            }
            ["CIRCUIT_BREAKER", "FAILURE_RATIO"] => {
                config.circuit_breaker.failure_ratio =
                    parse_optional(key, value, "expected float or 'none'")?;
            }
            ["CIRCUIT_BREAKER", "MIN_REQUESTS"] => {
                config.circuit_breaker.min_requests = parse(key, value, "expected integer")?;
            }
            ["CIRCUIT_BREAKER", "OPEN_TIMEOUT_MS"] => {
                config.circuit_breaker.open_timeout_ms = parse(key, value, "expected integer")?;
            }
            ["CIRCUIT_BREAKER", "INTERVAL_MS"] => {
                config.circuit_breaker.interval_ms =
                    parse_optional(key, value, "expected integer or 'none'")?;
            }
            ["CIRCUIT_BREAKER", "HALF_OPEN_REQUESTS"] => {
                config.circuit_breaker.half_open_requests =
                    parse(key, value, "expected integer")?;
            }

            ["LOOKUP", "BACKEND"] => {
                config.lookup.backend = match value.to_lowercase().as_str() {
                    "memory" => LookupBackend::Memory,
                    "sqlite" => LookupBackend::Sqlite,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'memory' or 'sqlite'",
                        ))
                    }
                };
            }
            ["LOOKUP", "URL"] => config.lookup.url = (!value.is_empty()).then(|| value.to_string()),
            ["LOOKUP", "RECORDS"] => {
                config.lookup.records = parse_records(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected name=id[,name=id]"))?;
            }

            ["TELEMETRY", "SERVICE_NAME"] => config.telemetry.service_name = value.to_string(),
            ["TELEMETRY", "SERVICE_VERSION"] => {
                config.telemetry.service_version =
                    (!value.is_empty()).then(|| value.to_string());
            }
            ["TELEMETRY", "ENVIRONMENT"] => config.telemetry.environment = value.to_string(),
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                config.telemetry.metrics.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => {
                config.telemetry.metrics.addr = value.to_string();
            }
            ["TELEMETRY", "TRACING", "ENABLED"] => {
                config.telemetry.tracing.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["TELEMETRY", "TRACING", "OTLP_ENDPOINT"] => {
                config.telemetry.tracing.otlp_endpoint =
                    (!value.is_empty()).then(|| value.to_string());
            }
            ["TELEMETRY", "TRACING", "SAMPLING_RATIO"] => {
                config.telemetry.tracing.sampling_ratio = parse(key, value, "expected float")?;
            }
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                config.telemetry.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }

            // Unknown keys are ignored.
            _ => {}
        }

        Ok(())
    }
}

fn parse<T: FromStr>(key: &str, value: &str, expected: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, expected))
}

fn parse_optional<T: FromStr>(
    key: &str,
    value: &str,
    expected: &str,
) -> Result<Option<T>, ConfigError> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        parse(key, value, expected).map(Some)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_records(s: &str) -> Option<std::collections::BTreeMap<String, String>> {
    s.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (name, id) = pair.split_once('=')?;
            Some((name.trim().to_string(), id.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:8081");
        assert_eq!(config.rate_limit.burst, 1);
    }

    #[test]
    fn test_loader_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.telemetry.logging.level, "debug");
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"rate_limit": {"burst": 5}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.rate_limit.burst, 5);
        assert_eq!(config.rate_limit.refill_interval_ms, 1_000);
    }

    #[test]
    fn test_loader_rejects_unknown_section() {
        let result = ConfigLoader::new().with_string("[authorization]\nenabled = true", "toml");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_loader_rejects_unknown_format() {
        assert!(ConfigLoader::new().with_string("", "yaml").is_err());
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/loginsvc.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/loginsvc.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, LoginsvcConfig::default());
    }

    #[test]
    fn test_env_overrides_from_explicit_vars() {
        let config = ConfigLoader::new()
            .with_env_prefix("TEST")
            .with_env_vars([
                ("TEST__SERVER__GRPC_ADDR", "127.0.0.1:7000"),
                ("TEST__RATE_LIMIT__BURST", "100"),
                ("TEST__CIRCUIT_BREAKER__OPEN_TIMEOUT_MS", "30000"),
                ("TEST__CIRCUIT_BREAKER__FAILURE_RATIO", "0.6"),
                ("TEST__LOOKUP__RECORDS", "ed=a123456789, bob=b2"),
                ("TESTING__RATE_LIMIT__BURST", "7"),
                ("OTHER__RATE_LIMIT__BURST", "9"),
            ])
            .load()
            .unwrap();

        assert_eq!(config.server.grpc_addr, "127.0.0.1:7000");
        assert_eq!(config.rate_limit.burst, 100);
        assert_eq!(config.circuit_breaker.open_timeout_ms, 30_000);
        assert_eq!(config.circuit_breaker.failure_ratio, Some(0.6));
        assert_eq!(config.lookup.records.len(), 2);
        assert_eq!(config.lookup.records["bob"], "b2");
    }

    #[test]
    fn test_env_selects_sqlite_lookup() {
        let config = ConfigLoader::new()
            .with_env_prefix("TEST")
            .with_env_vars([
                ("TEST__LOOKUP__BACKEND", "SQLite"),
                ("TEST__LOOKUP__URL", "sqlite://users.db"),
            ])
            .load()
            .unwrap();
        assert_eq!(config.lookup.backend, LookupBackend::Sqlite);
        assert_eq!(config.lookup.url.as_deref(), Some("sqlite://users.db"));

        let result = ConfigLoader::new()
            .with_env_prefix("TEST")
            .with_env_vars([("TEST__LOOKUP__BACKEND", "postgres")])
            .load();
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_env_overrides_validated() {
        let result = ConfigLoader::new()
            .with_env_prefix("TEST")
            .with_env_vars([("TEST__RATE_LIMIT__BURST", "0")])
            .load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_apply_env_var_invalid_integer() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__RATE_LIMIT__BURST", "lots", "TEST");
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_apply_env_var_optional_values() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__CIRCUIT_BREAKER__INTERVAL_MS", "5000", "TEST")
            .unwrap();
        assert_eq!(loader.config.circuit_breaker.interval_ms, Some(5_000));

        loader
            .apply_env_var("TEST__CIRCUIT_BREAKER__INTERVAL_MS", "none", "TEST")
            .unwrap();
        assert_eq!(loader.config.circuit_breaker.interval_ms, None);
    }

    #[test]
    fn test_apply_env_var_telemetry() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__TELEMETRY__LOGGING__FORMAT", "pretty", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__TELEMETRY__METRICS__ENABLED", "on", "TEST")
            .unwrap();
        assert_eq!(loader.config.telemetry.logging.format, LogFormat::Pretty);
        assert!(loader.config.telemetry.metrics.enabled);
    }

    #[test]
    fn test_parse_records() {
        let records = parse_records("a=1,b=2").unwrap();
        assert_eq!(records.len(), 2);
        assert!(parse_records("a").is_none());
        assert!(parse_records("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
