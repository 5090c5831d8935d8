//! Configuration management for WebProbe
//!
//! ```toml
//! [scanner]
//! threads = 10
//! timeout_seconds = 30
//! delay_ms = 100
//! verify_tls = true
//!
//! [scanner.headers]
//! X-Scan-Id = "nightly"
//!
//! [checks]
//! enabled = ["all"]
//! disabled = ["misc_checks"]
//! plugin_dir = "/etc/webprobe/checks"
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use crate::logging::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use webprobe_core::{Error, Result};
use webprobe_webapp::ScanConfig;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "WEBPROBE_";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Scanner settings
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Check selection
    #[serde(default)]
    pub checks: ChecksConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (WEBPROBE_ prefix)
    pub fn merge_env(self) -> Result<Self> {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    /// Merge overrides read through `lookup`, which receives full variable
    /// names such as `WEBPROBE_THREADS`.
    pub fn merge_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        // Scanner settings
        if let Some(val) = var("THREADS") {
            self.scanner.threads = parse_env("THREADS", &val)?;
        }
        if let Some(val) = var("TIMEOUT") {
            self.scanner.timeout_seconds = parse_env("TIMEOUT", &val)?;
        }
        if let Some(val) = var("DELAY_MS") {
            self.scanner.delay_ms = parse_env("DELAY_MS", &val)?;
        }
        if let Some(val) = var("PROXY") {
            self.scanner.proxy = Some(val).filter(|p| !p.trim().is_empty());
        }
        if let Some(val) = var("USER_AGENT") {
            self.scanner.user_agent = Some(val);
        }
        if let Some(val) = var("VERIFY_TLS") {
            self.scanner.verify_tls = parse_bool("VERIFY_TLS", &val)?;
        }

        // Logging
        if let Some(val) = var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = var("LOG_FORMAT") {
            self.logging.format = val
                .parse()
                .map_err(|e: String| Error::Configuration(format!("{}LOG_FORMAT: {}", ENV_PREFIX, e)))?;
        }

        Ok(self)
    }

    /// Build the per-scan configuration
    pub fn to_scan_config(&self) -> Result<ScanConfig> {
        let scanner = &self.scanner;
        let mut config = ScanConfig::default()
            .with_threads(scanner.threads)
            .with_timeout_ms(seconds_to_ms("timeout_seconds", scanner.timeout_seconds)?)
            .with_delay_ms(scanner.delay_ms)
            .with_verify_tls(scanner.verify_tls)
            .with_grace_period_ms(seconds_to_ms("grace_period_seconds", scanner.grace_period_seconds)?)
            .with_preflight(scanner.preflight)
            .with_checks(self.checks.enabled.iter().cloned())
            .with_excluded(self.checks.disabled.iter().cloned());

        config.follow_redirects = scanner.follow_redirects;
        config.max_redirects = scanner.max_redirects;

        if let Some(proxy) = &scanner.proxy {
            config = config.with_proxy(proxy);
        }
        if let Some(user_agent) = &scanner.user_agent {
            config = config.with_user_agent(user_agent);
        }
        if let Some(scan_timeout) = scanner.scan_timeout_seconds {
            config = config.with_scan_timeout_ms(seconds_to_ms("scan_timeout_seconds", scan_timeout)?);
        }
        for (name, value) in &scanner.headers {
            config = config.with_header(name, value);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| Error::Configuration(format!("{}{}='{}': {}", ENV_PREFIX, name, value, e)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Configuration(format!(
            "{}{}='{}': expected true or false",
            ENV_PREFIX, name, value
        ))),
    }
}

/// Convert a seconds value from a config file or flag into milliseconds.
///
/// `key` names the setting in the error. Negative and non-finite values
/// are rejected.
pub fn seconds_to_ms(key: &str, seconds: f64) -> Result<u64> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(Error::InvalidConfig {
            key: key.to_string(),
            message: format!("{} is not a valid number of seconds", seconds),
        });
    }
    Ok((seconds * 1000.0).round() as u64)
}

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Number of checks run concurrently
    pub threads: usize,

    /// Per-request timeout in seconds
    pub timeout_seconds: f64,

    /// Minimum spacing between requests in milliseconds
    pub delay_ms: u64,

    /// Verify TLS certificates
    pub verify_tls: bool,

    /// Proxy URL for all requests
    pub proxy: Option<String>,

    /// User agent override
    pub user_agent: Option<String>,

    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,

    pub follow_redirects: bool,

    pub max_redirects: u32,

    /// Global scan deadline in seconds
    pub scan_timeout_seconds: Option<f64>,

    /// Time in-flight checks get to finish after cancellation
    pub grace_period_seconds: f64,

    /// Request the target once before running checks
    pub preflight: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            threads: 10,
            timeout_seconds: 30.0,
            delay_ms: 100,
            verify_tls: true,
            proxy: None,
            user_agent: None,
            headers: BTreeMap::new(),
            follow_redirects: true,
            max_redirects: 10,
            scan_timeout_seconds: None,
            grace_period_seconds: 5.0,
            preflight: true,
        }
    }
}

/// Which checks run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    /// Checks to run (empty or "all" for every registered check)
    pub enabled: Vec<String>,

    /// Checks removed from the selection
    pub disabled: Vec<String>,

    /// Directory of YAML probe checks
    pub plugin_dir: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    String::from("info")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig::new().level(&self.level).format(self.format)
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.config.scanner.threads = threads;
        self
    }

    pub fn timeout_seconds(mut self, timeout: f64) -> Self {
        self.config.scanner.timeout_seconds = timeout;
        self
    }

    pub fn delay_ms(mut self, delay: u64) -> Self {
        self.config.scanner.delay_ms = delay;
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.config.scanner.proxy = Some(proxy.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.scanner.user_agent = Some(user_agent.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.scanner.headers.insert(name.into(), value.into());
        self
    }

    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.config.scanner.verify_tls = verify;
        self
    }

    pub fn enable(mut self, check: impl Into<String>) -> Self {
        self.config.checks.enabled.push(check.into());
        self
    }

    pub fn disable(mut self, check: impl Into<String>) -> Self {
        self.config.checks.disabled.push(check.into());
        self
    }

    pub fn plugin_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.checks.plugin_dir = Some(dir.into());
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scanner.threads, 10);
        assert_eq!(config.scanner.timeout_seconds, 30.0);
        assert_eq!(config.scanner.delay_ms, 100);
        assert!(config.scanner.verify_tls);
        assert!(config.checks.enabled.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [scanner]
            threads = 4
            timeout_seconds = 2.5
            proxy = "http://127.0.0.1:8080"

            [scanner.headers]
            X-Scan-Id = "nightly"

            [checks]
            enabled = ["header_checks", "cookie_checks"]
            disabled = ["cookie_checks"]

            [logging]
            format = "json"
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.scanner.threads, 4);
        assert_eq!(config.scanner.delay_ms, 100);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");

        let scan = config.to_scan_config().unwrap();
        assert_eq!(scan.threads, 4);
        assert_eq!(scan.timeout_ms, 2_500);
        assert_eq!(scan.proxy.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(scan.custom_headers, vec![("X-Scan-Id".to_string(), "nightly".to_string())]);
        assert_eq!(scan.checks, vec!["header_checks", "cookie_checks"]);
        assert_eq!(scan.excluded_checks, vec!["cookie_checks"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Config::from_toml("[scanner]\nthreads = \"many\""),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Config::from_toml("[logging]\nformat = \"xml\""),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("WEBPROBE_THREADS", "3"),
            ("WEBPROBE_DELAY_MS", "0"),
            ("WEBPROBE_VERIFY_TLS", "no"),
            ("WEBPROBE_LOG_FORMAT", "compact"),
            ("THREADS", "99"),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .merge_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.scanner.threads, 3);
        assert_eq!(config.scanner.delay_ms, 0);
        assert!(!config.scanner.verify_tls);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_bad_env_value_is_reported() {
        let err = Config::default()
            .merge_env_from(|k| (k == "WEBPROBE_THREADS").then(|| "ten".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("WEBPROBE_THREADS"));
    }

    #[test]
    fn test_to_scan_config_validates() {
        let config = Config::builder().threads(0).build();
        assert!(matches!(
            config.to_scan_config(),
            Err(Error::InvalidConfig { ref key, .. }) if key == "threads"
        ));

        let config = Config::builder().timeout_seconds(-1.0).build();
        assert!(config.to_scan_config().is_err());

        let config = Config::builder().proxy("not a url").build();
        assert!(config.to_scan_config().is_err());
    }

    #[test]
    fn test_seconds_to_ms() {
        assert_eq!(seconds_to_ms("timeout_seconds", 2.5).unwrap(), 2500);
        assert_eq!(seconds_to_ms("timeout_seconds", 0.0).unwrap(), 0);
        assert!(matches!(
            seconds_to_ms("--delay", -1.0),
            Err(Error::InvalidConfig { ref key, .. }) if key == "--delay"
        ));
        assert!(seconds_to_ms("--timeout", f64::NAN).is_err());
        assert!(seconds_to_ms("--timeout", f64::INFINITY).is_err());
    }

    #[test]
    fn test_builder() {
        let config = Config::builder()
            .delay_ms(250)
            .user_agent("audit/1.0")
            .header("Authorization", "Bearer x")
            .enable("file_checks")
            .disable("misc_checks")
            .plugin_dir("/tmp/checks")
            .build();

        let scan = config.to_scan_config().unwrap();
        assert_eq!(scan.request_delay_ms, 250);
        assert_eq!(scan.user_agent, "audit/1.0");
        assert_eq!(scan.checks, vec!["file_checks"]);
        assert_eq!(scan.excluded_checks, vec!["misc_checks"]);
        assert_eq!(config.checks.plugin_dir.as_deref(), Some("/tmp/checks"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scanner]\nthreads = 2").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.scanner.threads, 2);

        assert!(matches!(
            Config::from_file("/nonexistent/webprobe.toml"),
            Err(Error::FileNotFound { .. })
        ));
    }
}
