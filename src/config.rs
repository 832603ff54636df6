//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::{Result, ThermoLinkError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub topics: TopicConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// MQTT broker configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    /// Empty means "generate one per process"
    #[serde(default)]
    pub client_id: String,

    #[serde(default = "default_keep_alive_s")]
    pub keep_alive_s: u64,

    #[serde(default = "default_clean_session")]
    pub clean_session: bool,

    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Topic configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TopicConfig {
    /// Commands to the peer
    #[serde(default = "default_publish_topic")]
    pub publish: String,

    /// Readings, replies and acks from the peer
    #[serde(default = "default_subscribe_topic")]
    pub subscribe: String,
}

/// Link watchdog configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_liveness_threshold_ms")]
    pub liveness_threshold_ms: u64,

    #[serde(default = "default_ack_window_ms")]
    pub ack_window_ms: u64,

    /// Re-publishes of an unacknowledged command (0 = count only)
    #[serde(default)]
    pub max_retries: u32,
}

/// History window configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,

    /// Spacing of the peer's samples, used to back-fill replayed history
    #[serde(default = "default_sample_interval_s")]
    pub sample_interval_s: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Daily-rotated log file directory; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_broker_host() -> String { "broker.emqx.io".to_string() }
fn default_broker_port() -> u16 { 1883 }
fn default_keep_alive_s() -> u64 { 30 }
fn default_clean_session() -> bool { true }
fn default_event_capacity() -> usize { 10 }

fn default_publish_topic() -> String { "thermostat/command".to_string() }
fn default_subscribe_topic() -> String { "thermostat/telemetry".to_string() }

fn default_liveness_threshold_ms() -> u64 { 30_000 }
fn default_ack_window_ms() -> u64 { 5_000 }

fn default_history_capacity() -> usize { 360 }
fn default_sample_interval_s() -> u64 { 30 }

fn default_log_level() -> String { "info".to_string() }

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            client_id: String::new(),
            keep_alive_s: default_keep_alive_s(),
            clean_session: default_clean_session(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            publish: default_publish_topic(),
            subscribe: default_subscribe_topic(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            liveness_threshold_ms: default_liveness_threshold_ms(),
            ack_window_ms: default_ack_window_ms(),
            max_retries: 0,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            sample_interval_s: default_sample_interval_s(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

impl BrokerConfig {
    /// Client id to present to the broker
    ///
    /// The configured id, or `thermostat-link-<pid>-<millis>` when unset.
    pub fn effective_client_id(&self) -> String {
        if !self.client_id.is_empty() {
            return self.client_id.clone();
        }

        format!(
            "thermostat-link-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_millis()
        )
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use thermostat_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.broker.host.is_empty() {
            return Err(invalid("broker host cannot be empty"));
        }

        if self.broker.port == 0 {
            return Err(invalid("broker port must be greater than 0"));
        }

        if self.broker.keep_alive_s < 5 || self.broker.keep_alive_s > 3600 {
            return Err(invalid("keep_alive_s must be between 5 and 3600"));
        }

        if self.broker.event_capacity == 0 {
            return Err(invalid("event_capacity must be greater than 0"));
        }

        if self.topics.publish.is_empty() || self.topics.subscribe.is_empty() {
            return Err(invalid("publish and subscribe topics cannot be empty"));
        }

        if self.topics.publish == self.topics.subscribe {
            return Err(invalid("publish and subscribe topics must be distinct"));
        }

        for topic in [&self.topics.publish, &self.topics.subscribe] {
            if topic.contains('+') || topic.contains('#') {
                return Err(invalid(format!("topic '{}' cannot contain wildcards", topic)));
            }
        }

        if self.link.liveness_threshold_ms < 1_000 || self.link.liveness_threshold_ms > 600_000 {
            return Err(invalid("liveness_threshold_ms must be between 1000 and 600000"));
        }

        if self.link.ack_window_ms < 500 || self.link.ack_window_ms > 60_000 {
            return Err(invalid("ack_window_ms must be between 500 and 60000"));
        }

        if self.link.max_retries > 10 {
            return Err(invalid("max_retries must be between 0 and 10"));
        }

        if self.history.capacity == 0 || self.history.capacity > 100_000 {
            return Err(invalid("history capacity must be between 1 and 100000"));
        }

        if self.history.sample_interval_s == 0 || self.history.sample_interval_s > 86_400 {
            return Err(invalid("sample_interval_s must be between 1 and 86400"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        if matches!(&self.logging.log_dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("log_dir cannot be empty when set"));
        }

        Ok(())
    }
}

fn invalid(message: impl std::fmt::Display) -> ThermoLinkError {
    ThermoLinkError::Config(toml::de::Error::custom(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[broker]
host = "localhost"

[topics]
publish = "home/thermostat/mosi"
subscribe = "home/thermostat/miso"

[link]
ack_window_ms = 1500
max_retries = 2

[history]

[logging]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.topics.publish, "home/thermostat/mosi");
        assert_eq!(config.link.ack_window_ms, 1500);
        assert_eq!(config.link.max_retries, 2);
        assert_eq!(config.history.capacity, 360);
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.broker.host, "broker.emqx.io");
        assert_eq!(config.link.liveness_threshold_ms, 30_000);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/thermostat-link.toml");
        assert!(matches!(result, Err(ThermoLinkError::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = Config::from_toml("[broker\nhost = 1");
        assert!(matches!(result, Err(ThermoLinkError::Config(_))));
    }

    #[test]
    fn test_empty_broker_host() {
        let mut config = Config::default();
        config.broker.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_broker_port_zero() {
        let mut config = Config::default();
        config.broker.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_keep_alive_out_of_range() {
        let mut config = Config::default();
        config.broker.keep_alive_s = 1;
        assert!(config.validate().is_err());

        config.broker.keep_alive_s = 3601;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_event_capacity_zero() {
        let mut config = Config::default();
        config.broker.event_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_topic() {
        let mut config = Config::default();
        config.topics.subscribe = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_topics() {
        let mut config = Config::default();
        config.topics.subscribe = config.topics.publish.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wildcard_topic() {
        let mut config = Config::default();
        config.topics.subscribe = "thermostat/+".to_string();
        assert!(config.validate().is_err());

        config.topics.subscribe = "thermostat/#".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_liveness_threshold_range() {
        let mut config = Config::default();
        config.link.liveness_threshold_ms = 999;
        assert!(config.validate().is_err());

        config.link.liveness_threshold_ms = 600_001;
        assert!(config.validate().is_err());

        config.link.liveness_threshold_ms = 1_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ack_window_range() {
        let mut config = Config::default();
        config.link.ack_window_ms = 499;
        assert!(config.validate().is_err());

        config.link.ack_window_ms = 60_001;
        assert!(config.validate().is_err());

        for window in [1_500, 10_000] {
            config.link.ack_window_ms = window;
            assert!(config.validate().is_ok(), "Ack window {} should be valid", window);
        }
    }

    #[test]
    fn test_max_retries_too_high() {
        let mut config = Config::default();
        config.link.max_retries = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_history_capacity_zero() {
        let mut config = Config::default();
        config.history.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_interval_zero() {
        let mut config = Config::default();
        config.history.sample_interval_s = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_set() {
        let mut config = Config::default();
        config.logging.log_dir = Some(String::new());
        assert!(config.validate().is_err());

        config.logging.log_dir = Some("./logs".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_effective_client_id() {
        let mut broker = BrokerConfig::default();
        assert!(broker.effective_client_id().starts_with("thermostat-link-"));

        broker.client_id = "living-room".to_string();
        assert_eq!(broker.effective_client_id(), "living-room");
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_broker_host(), "broker.emqx.io");
        assert_eq!(default_broker_port(), 1883);
        assert_eq!(default_keep_alive_s(), 30);
        assert_eq!(default_clean_session(), true);
        assert_eq!(default_event_capacity(), 10);
        assert_eq!(default_publish_topic(), "thermostat/command");
        assert_eq!(default_subscribe_topic(), "thermostat/telemetry");
        assert_eq!(default_liveness_threshold_ms(), 30_000);
        assert_eq!(default_ack_window_ms(), 5_000);
        assert_eq!(default_history_capacity(), 360);
        assert_eq!(default_sample_interval_s(), 30);
        assert_eq!(default_log_level(), "info");
    }
}
