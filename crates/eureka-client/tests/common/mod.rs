//! Common test utilities for eureka client integration tests

use eureka_client::{ClientConfig, EurekaClient, SmolSpawner, transport::mock::MockTransport};
use std::sync::Arc;
use std::time::Duration;

/// Registry base URL used throughout the tests
pub const REGISTRY_URL: &str = "http://reg:8080/eureka/";

/// Heartbeat interval short enough to run many cycles per test
pub const TEST_INTERVAL_MS: u64 = 20;

/// Upper bound for waiting on background activity
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration pointing at the mock registry
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::standalone("orders").with_registry_url(REGISTRY_URL);
    config.instance.host_name = "orders-1".to_string();
    config.instance.port = 8080;
    config.heartbeat.interval_ms = TEST_INTERVAL_MS;
    config.heartbeat.reregister_backoff_ms = 1;
    config
}

/// Client on top of a shared mock transport
pub fn test_client(config: ClientConfig) -> (EurekaClient, Arc<MockTransport>) {
    let mock = Arc::new(MockTransport::new());
    let client = EurekaClient::new(config, mock.clone(), Arc::new(SmolSpawner))
        .expect("Failed to create client");
    (client, mock)
}

/// Poll until the condition holds or the test timeout expires
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + TEST_TIMEOUT;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        smol::Timer::after(Duration::from_millis(5)).await;
    }
    condition()
}

/// Let a few heartbeat intervals pass
pub async fn idle_cycles(cycles: u64) {
    smol::Timer::after(Duration::from_millis(TEST_INTERVAL_MS * cycles)).await;
}

/// Registry `GET /apps/` body for the given applications and endpoints
pub fn apps_body(apps: Vec<(&str, Vec<&str>)>) -> String {
    let application: Vec<serde_json::Value> = apps
        .into_iter()
        .map(|(name, endpoints)| {
            let instance: Vec<serde_json::Value> = endpoints
                .into_iter()
                .map(|endpoint| {
                    serde_json::json!({
                        "app": name,
                        "homePageUrl": endpoint,
                        "status": "UP",
                    })
                })
                .collect();
            serde_json::json!({ "name": name, "instance": instance })
        })
        .collect();

    serde_json::json!({
        "applications": {
            "versions__delta": "1",
            "apps__hashcode": "UP_1_",
            "application": application,
        }
    })
    .to_string()
}
