//! Configuration structures for the eureka client

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Eureka client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Where the registry lives
    #[serde(default)]
    pub registry: RegistryConfig,
    /// How this process describes itself
    pub instance: InstanceConfig,
    /// Renewal loop tuning
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// HTTP transport tuning
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Registry location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL, e.g. `http://reg:8080/eureka/`. Empty means standalone.
    #[serde(default)]
    pub service_url: String,
}

/// Local process identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Application name
    pub app_name: String,
    /// Advertised host name
    #[serde(default = "default_host_name")]
    pub host_name: String,
    /// Advertised IP address
    #[serde(default = "default_ip_addr")]
    pub ip_addr: String,
    /// Plain HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// TLS port, disabled when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_port: Option<u16>,
    /// Fixed instance id; derived from host, app and port when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    /// Path of the home page
    #[serde(default = "default_home_page_path")]
    pub home_page_path: String,
    /// Path of the status page
    #[serde(default = "default_status_page_path")]
    pub status_page_path: String,
    /// Path of the health check
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
    /// Virtual IP address; the lower-cased app name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vip_address: Option<String>,
    /// Free-form metadata advertised with the instance
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Renewal loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Delay between renewal cycles in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Consecutive re-registrations allowed after renewal rejections
    #[serde(default = "default_max_reregistrations")]
    pub max_reregistrations: u32,
    /// Initial delay before a re-registration, doubled per attempt
    #[serde(default = "default_reregister_backoff_ms")]
    pub reregister_backoff_ms: u64,
}

/// HTTP transport tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Additional attempts after a transport failure
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Initial delay between attempts, doubled per attempt
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn default_ip_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_home_page_path() -> String {
    "/".to_string()
}

fn default_status_page_path() -> String {
    "/info".to_string()
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

fn default_interval_ms() -> u64 {
    10_000
}

fn default_max_reregistrations() -> u32 {
    5
}

fn default_reregister_backoff_ms() -> u64 {
    1_000
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    200
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_reregistrations: default_max_reregistrations(),
            reregister_backoff_ms: default_reregister_backoff_ms(),
        }
    }
}

impl HeartbeatConfig {
    /// Delay between renewal cycles
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Delay before the given re-registration attempt (1-based)
    pub fn reregister_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let delay = self.reregister_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.interval_ms))
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl InstanceConfig {
    /// Identity with defaults for everything but the app name
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            host_name: default_host_name(),
            ip_addr: default_ip_addr(),
            port: default_port(),
            secure_port: None,
            instance_id: None,
            home_page_path: default_home_page_path(),
            status_page_path: default_status_page_path(),
            health_check_path: default_health_check_path(),
            vip_address: None,
            metadata: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from file
    pub async fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use async_fs::File;
        use futures::io::AsyncReadExt;

        let mut file = File::open(path.as_ref()).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        // YAML by extension, JSON otherwise
        let config: Self = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            _ => serde_json::from_str(&contents)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration that never talks to a registry
    pub fn standalone(app_name: impl Into<String>) -> Self {
        Self {
            registry: RegistryConfig::default(),
            instance: InstanceConfig::new(app_name),
            heartbeat: HeartbeatConfig::default(),
            transport: TransportConfig::default(),
        }
    }

    /// Point the configuration at a registry
    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry.service_url = url.into();
        self
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.instance.app_name.trim().is_empty() {
            return Err(Error::Config("instance.app_name cannot be empty".to_string()));
        }
        if self.heartbeat.interval_ms == 0 {
            return Err(Error::Config(
                "heartbeat.interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether discovery is disabled
    pub fn is_standalone(&self) -> bool {
        self.registry.service_url.trim().is_empty()
    }

    /// `{service_url}/apps/`, or `{service_url}/apps/{segments...}`
    pub fn apps_url(&self, segments: &[&str]) -> String {
        let mut url = format!("{}/apps/", self.registry.service_url.trim().trim_end_matches('/'));
        url.push_str(&segments.join("/"));
        url
    }
}
