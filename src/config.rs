//! Configuration system for the field agent
//!
//! TOML-backed, with serde defaults for every optional field. Credentials are
//! never stored in the file; the config carries environment variable *names*
//! which are resolved when the transport connects.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main agent configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub agent: AgentSection,
    pub mqtt: MqttSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

/// Agent section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSection {
    /// Agent name (must match [a-zA-Z0-9._-]+), used in the MQTT client id
    pub name: String,
    /// Directory where completed firmware images are written
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,
}

/// MQTT section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// MQTT broker URL with protocol and port (mqtt:// or mqtts://)
    pub broker_url: String,
    /// Device topic namespace for attribute and telemetry topics
    #[serde(default = "default_base_topic")]
    pub base_topic: String,
    /// Environment variable containing the device username/access token
    pub username_env: Option<String>,
    /// Environment variable containing the device password
    pub password_env: Option<String>,
    /// Keep-alive interval in seconds (default: 60)
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

impl MqttSection {
    /// Resolve the device username/token from the configured environment variable
    pub fn username(&self) -> Option<String> {
        self.username_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
    }

    /// Resolve the device password from the configured environment variable
    pub fn password(&self) -> Option<String> {
        self.password_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
    }
}

/// Telemetry section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    /// Publish cadence in milliseconds (default: 1000)
    #[serde(default = "default_telemetry_interval")]
    pub interval_ms: u64,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            interval_ms: default_telemetry_interval(),
        }
    }
}

fn default_install_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_base_topic() -> String {
    "v1/devices/me".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_telemetry_interval() -> u64 {
    1000
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid agent name format: {0}")]
    InvalidAgentName(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AgentConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&content)?;

        validate_agent_name(&config.agent.name)?;
        validate_base_topic(&config.mqtt.base_topic)?;

        Ok(config)
    }

    /// Get MQTT username from the configured environment variable
    pub fn get_mqtt_username(&self) -> Option<String> {
        self.mqtt.username()
    }

    /// Get MQTT password from the configured environment variable
    pub fn get_mqtt_password(&self) -> Option<String> {
        self.mqtt.password()
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[agent]
name = "test-device"

[mqtt]
broker_url = "mqtt://localhost:1883"

[telemetry]
interval_ms = 1000
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate agent name format
fn validate_agent_name(name: &str) -> Result<(), ConfigError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if name.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidAgentName(format!(
            "Agent name '{name}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

/// Validate the device topic namespace
fn validate_base_topic(base: &str) -> Result<(), ConfigError> {
    if base.is_empty() || base.starts_with('/') || base.ends_with('/') {
        return Err(ConfigError::InvalidConfig(format!(
            "base_topic '{base}' must be non-empty with no leading or trailing slash"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[agent]
name = "greenhouse-7"
install_dir = "/var/lib/fwagent"

[mqtt]
broker_url = "mqtts://broker.example.com:8883"
base_topic = "v1/devices/me"
username_env = "FWAGENT_MQTT_USERNAME"
password_env = "FWAGENT_MQTT_PASSWORD"
keep_alive_secs = 30

[telemetry]
interval_ms = 500
"#;

        let config: AgentConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.agent.name, "greenhouse-7");
        assert_eq!(config.agent.install_dir, PathBuf::from("/var/lib/fwagent"));
        assert_eq!(config.mqtt.broker_url, "mqtts://broker.example.com:8883");
        assert_eq!(config.mqtt.keep_alive_secs, 30);
        assert_eq!(config.telemetry.interval_ms, 500);
    }

    #[test]
    fn test_minimal_config_applies_defaults() {
        let toml_content = r#"
[agent]
name = "minimal"

[mqtt]
broker_url = "mqtt://localhost:1883"
"#;

        let config: AgentConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.agent.install_dir, PathBuf::from("."));
        assert_eq!(config.mqtt.base_topic, "v1/devices/me");
        assert_eq!(config.mqtt.username_env, None);
        assert_eq!(config.mqtt.keep_alive_secs, 60);
        assert_eq!(config.telemetry.interval_ms, 1000);
    }

    #[test]
    fn test_invalid_agent_name() {
        let result = validate_agent_name("invalid@device");
        assert!(result.is_err());

        let result = validate_agent_name("valid-device_123.test");
        assert!(result.is_ok());

        let result = validate_agent_name("");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_base_topic() {
        assert!(validate_base_topic("v1/devices/me").is_ok());
        assert!(validate_base_topic("").is_err());
        assert!(validate_base_topic("/v1/devices/me").is_err());
        assert!(validate_base_topic("v1/devices/me/").is_err());
    }

    #[test]
    fn test_credentials_resolve_from_env() {
        let toml_content = r#"
[agent]
name = "env-test"

[mqtt]
broker_url = "mqtt://localhost:1883"
username_env = "FWAGENT_TEST_USERNAME_VAR"
"#;
        let config: AgentConfig = toml::from_str(toml_content).unwrap();

        std::env::set_var("FWAGENT_TEST_USERNAME_VAR", "device-token");
        assert_eq!(config.get_mqtt_username(), Some("device-token".to_string()));
        std::env::remove_var("FWAGENT_TEST_USERNAME_VAR");

        assert_eq!(config.get_mqtt_username(), None);
        assert_eq!(config.get_mqtt_password(), None);
    }
}
