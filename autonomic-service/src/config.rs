use anyhow::{Context, Result};
use autonomic_core::{ConfigError, DetectionConfig, MonitorConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

pub const CONFIG_ENV: &str = "AUTONOMIC_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "autonomic.yaml";
pub const DEFAULT_EVENTS_TOPIC: &str = "autonomic/events@v1";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub detection: DetectionConfig,
    pub monitor: MonitorConfig,
    pub source: SourceMode,
    pub http: HttpConf,
    pub mqtt: Option<MqttConf>,
}

/// Where readings come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// In-process readings with fault injection over HTTP
    #[default]
    Simulated,
    /// The real machine, through sysinfo
    Host,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConf {
    pub bind: String,
}

impl Default for HttpConf {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String {
    DEFAULT_EVENTS_TOPIC.to_string()
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()?;
        self.monitor.validate()
    }
}

/// Path from `AUTONOMIC_CONFIG`, falling back to `autonomic.yaml`
pub async fn load_config() -> Result<ServiceConfig> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    load_config_from(&path).await
}

/// Missing or empty file gives defaults; unparsable YAML is an error.
pub async fn load_config_from(path: impl AsRef<Path>) -> Result<ServiceConfig> {
    let path = path.as_ref();
    if !path.exists() {
        warn!("No config at {}, using defaults", path.display());
        return Ok(ServiceConfig::default());
    }

    let txt = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    if txt.trim().is_empty() {
        return Ok(ServiceConfig::default());
    }

    serde_yaml::from_str(&txt).with_context(|| format!("Invalid config {}", path.display()))
}
