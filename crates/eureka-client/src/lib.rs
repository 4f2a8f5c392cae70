//! Registration and discovery client for Eureka-style service registries
//!
//! This crate advertises the running process to a central registry, keeps
//! that advertisement alive with periodic renewals, downloads the registry's
//! view of all known services, and withdraws the advertisement on failure or
//! shutdown.
//!
//! # Architecture
//!
//! The client does not depend on a particular async runtime:
//!
//! - [`Transport`] is the HTTP seam; [`RetryingTransport`] adds retries with
//!   backoff and `ReqwestTransport` (feature `reqwest`) talks to a real
//!   registry
//! - [`Spawner`] runs the heartbeat task on whichever executor the caller
//!   uses
//! - [`RegistryCache`] holds the discovered services for call-routing code
//!
//! # Example
//!
//! ```no_run
//! use eureka_client::{ClientConfig, ClientState, EurekaClient, SmolSpawner};
//! use std::sync::Arc;
//!
//! # async fn example(transport: Arc<dyn eureka_client::Transport>) -> eureka_client::Result<()> {
//! let config = ClientConfig::standalone("orders")
//!     .with_registry_url("http://registry:8761/eureka/");
//! let client = EurekaClient::new(config, transport, Arc::new(SmolSpawner))?;
//!
//! if client.register().await == ClientState::Up {
//!     let peers = client.cache().instances("billing");
//!     println!("billing instances: {:?}", peers);
//! }
//!
//! // On the way out
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod client;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod models;
pub mod runtime;
pub mod transport;

pub use cache::{CacheView, RegistryCache};
pub use client::EurekaClient;
pub use config::{ClientConfig, HeartbeatConfig, InstanceConfig, RegistryConfig, TransportConfig};
pub use descriptor::build_descriptor;
pub use error::{Error, Result, TransportError};
pub use models::*;
pub use runtime::{SmolSpawner, Spawner};
#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, RetryingTransport, Transport};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;

/// Re-export key types for convenience
pub mod prelude {
    pub use crate::{
        ClientConfig,
        ClientState,
        DiscoveredInstance,
        EurekaClient,
        Error,
        RegistryCache,
        Result,
        Spawner,
        Transport,
    };
}
