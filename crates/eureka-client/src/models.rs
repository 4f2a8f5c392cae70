//! Data models for the eureka client
//!
//! The wire types mirror the registry's JSON documents. Only the fields the
//! client acts on are decoded from registry responses; everything else is
//! ignored.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Registration status observed by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientState {
    /// Registered, and the last renewal/fetch succeeded
    Up,
    /// Deregistration completed normally
    Down,
    /// Standalone mode or registration rejected
    OutOfService,
    /// A renewal, fetch or deregistration failed
    Unknown,
}

impl ClientState {
    /// Registry spelling of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientState::Up => "UP",
            ClientState::Down => "DOWN",
            ClientState::OutOfService => "OUT_OF_SERVICE",
            ClientState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-description sent to the registry on registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDescriptor {
    /// Unique id within the application
    pub instance_id: String,
    /// Advertised host name
    pub host_name: String,
    /// Application name (upper-cased by convention)
    pub app: String,
    /// Advertised IP address
    pub ip_addr: String,
    /// Declared status
    pub status: ClientState,
    /// Plain port
    pub port: PortInfo,
    /// TLS port
    pub secure_port: PortInfo,
    /// Home page URL, used by peers as the call endpoint
    pub home_page_url: String,
    /// Status page URL
    pub status_page_url: String,
    /// Health check URL
    pub health_check_url: String,
    /// Virtual IP address (logical service name)
    pub vip_address: String,
    /// Data center descriptor
    pub data_center_info: DataCenterInfo,
    /// Free-form metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Port with its enabled flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// Port number
    #[serde(rename = "$")]
    pub port: u16,
    /// "true" or "false"
    #[serde(rename = "@enabled")]
    pub enabled: String,
}

impl PortInfo {
    /// An enabled port
    pub fn enabled(port: u16) -> Self {
        Self {
            port,
            enabled: "true".to_string(),
        }
    }

    /// A disabled port
    pub fn disabled(port: u16) -> Self {
        Self {
            port,
            enabled: "false".to_string(),
        }
    }
}

/// Data center descriptor; this client always reports a self-hosted one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCenterInfo {
    /// Registry-side class tag
    #[serde(rename = "@class")]
    pub class: String,
    /// Data center name
    pub name: String,
}

impl Default for DataCenterInfo {
    fn default() -> Self {
        Self {
            class: "com.netflix.appinfo.InstanceInfo$DefaultDataCenterInfo".to_string(),
            name: "MyOwn".to_string(),
        }
    }
}

/// Registration request body
#[derive(Debug, Serialize, Deserialize)]
pub struct InstanceEnvelope {
    /// The descriptor being registered
    pub instance: InstanceDescriptor,
}

impl InstanceEnvelope {
    /// Serialize a descriptor into the registration body
    pub fn encode(descriptor: &InstanceDescriptor) -> crate::Result<String> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            instance: &'a InstanceDescriptor,
        }
        Ok(serde_json::to_string(&Borrowed {
            instance: descriptor,
        })?)
    }
}

/// One reachable instance of a discovered application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredInstance {
    /// Endpoint URL (the instance's home page)
    pub endpoint: String,
    /// Status reported by the registry
    pub status: String,
}

/// One application as returned by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSnapshot {
    /// Application name as reported (case preserved)
    pub name: String,
    /// Instances in registry order
    pub instances: Vec<DiscoveredInstance>,
}

/// Full application view fetched at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Applications in registry order
    pub applications: Vec<ApplicationSnapshot>,
}

impl RegistrySnapshot {
    /// Decode the registry's `GET /apps/` response body.
    ///
    /// Either the whole document decodes or an error is returned; there is
    /// no partial result.
    pub fn from_json(body: &str) -> crate::Result<Self> {
        let wire: WireApplicationsEnvelope = serde_json::from_str(body)?;
        let applications = wire
            .applications
            .application
            .into_iter()
            .map(|app| ApplicationSnapshot {
                name: app.name,
                instances: app
                    .instance
                    .into_iter()
                    .map(|inst| DiscoveredInstance {
                        endpoint: inst.home_page_url,
                        status: inst.status,
                    })
                    .collect(),
            })
            .collect();
        Ok(Self { applications })
    }

    /// Number of applications
    pub fn len(&self) -> usize {
        self.applications.len()
    }

    /// Whether the snapshot carries no applications
    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct WireApplicationsEnvelope {
    applications: WireApplications,
}

#[derive(Debug, Deserialize)]
struct WireApplications {
    #[serde(default, deserialize_with = "one_or_many")]
    application: Vec<WireApplication>,
}

#[derive(Debug, Deserialize)]
struct WireApplication {
    name: String,
    #[serde(default, deserialize_with = "one_or_many")]
    instance: Vec<WireInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInstance {
    home_page_url: String,
    status: String,
}

// The registry collapses single-element lists into a bare object.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}
