//! Integration tests for the registration lifecycle
//!
//! These drive the heartbeat task against a scripted registry and check the
//! sequence of requests it produces and the state it leaves behind.

use eureka_client::{
    ClientState, HttpMethod,
    transport::mock::MockReply,
};

mod common;
use common::*;

/// Register, one renew, one fetch: state is UP and the cache holds the
/// fetched instances in registry order
#[smol_potat::test]
async fn test_end_to_end_single_iteration() {
    let (client, mock) = test_client(test_config());
    mock.respond(HttpMethod::Post, MockReply::status(204));
    mock.respond(HttpMethod::Put, MockReply::status(204));
    mock.respond(
        HttpMethod::Get,
        MockReply::body(
            200,
            apps_body(vec![(
                "orders",
                vec!["http://10.0.0.1:8080/", "http://10.0.0.2:8080/"],
            )]),
        ),
    );

    assert_eq!(client.register().await, ClientState::Up);
    assert!(wait_until(|| client.cache().instances("orders").is_some()).await);

    assert_eq!(client.state(), ClientState::Up);
    let instances = client.cache().instances("orders").unwrap();
    let endpoints: Vec<&str> = instances.iter().map(|i| i.endpoint.as_str()).collect();
    assert_eq!(endpoints, vec!["http://10.0.0.1:8080/", "http://10.0.0.2:8080/"]);

    let requests = mock.requests();
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[0].url, "http://reg:8080/eureka/apps/ORDERS");
    assert_eq!(requests[1].method, HttpMethod::Put);
    assert_eq!(requests[1].url, "http://reg:8080/eureka/apps/ORDERS/orders-1:orders:8080");
    assert_eq!(requests[2].method, HttpMethod::Get);
    assert_eq!(requests[2].url, "http://reg:8080/eureka/apps/");

    client.shutdown().await;
}

/// Within each cycle the renewal precedes the fetch
#[smol_potat::test]
async fn test_renew_precedes_fetch_every_cycle() {
    let (client, mock) = test_client(test_config());

    client.register().await;
    assert!(wait_until(|| mock.count(HttpMethod::Get) >= 3).await);
    client.shutdown().await;

    let methods = mock.methods();
    assert_eq!(methods[0], HttpMethod::Post);
    assert_eq!(*methods.last().unwrap(), HttpMethod::Delete);
    for pair in methods[1..methods.len() - 1].chunks(2) {
        assert_eq!(pair[0], HttpMethod::Put);
        if pair.len() == 2 {
            assert_eq!(pair[1], HttpMethod::Get);
        }
    }
}

/// A rejected renewal deregisters before registering again
#[smol_potat::test]
async fn test_renew_rejection_reregisters() {
    let (client, mock) = test_client(test_config());
    mock.enqueue(HttpMethod::Put, MockReply::body(404, "lease expired"));

    client.register().await;
    assert!(wait_until(|| mock.count(HttpMethod::Get) >= 1).await);

    let methods = mock.methods();
    assert_eq!(
        &methods[..5],
        &[
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Delete,
            HttpMethod::Post,
            HttpMethod::Put,
        ]
    );
    assert_eq!(client.state(), ClientState::Up);
    assert!(client.is_heartbeat_running());

    client.shutdown().await;
    assert_eq!(mock.count(HttpMethod::Delete), 2);
}

/// A transport failure on renew ends the task after exactly one
/// deregistration, and nothing is sent afterwards
#[smol_potat::test]
async fn test_renew_transport_failure_stops_permanently() {
    let (client, mock) = test_client(test_config());
    mock.respond(HttpMethod::Put, MockReply::fail());
    mock.respond(HttpMethod::Delete, MockReply::fail());

    client.register().await;
    assert!(wait_until(|| !client.is_heartbeat_running()).await);
    idle_cycles(5).await;

    assert_eq!(client.state(), ClientState::Unknown);
    assert_eq!(
        mock.methods(),
        vec![HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete]
    );
}

/// A transport failure on fetch ends the task the same way
#[smol_potat::test]
async fn test_fetch_transport_failure_stops_permanently() {
    let (client, mock) = test_client(test_config());
    mock.respond(HttpMethod::Get, MockReply::fail());
    mock.respond(HttpMethod::Delete, MockReply::fail());

    client.register().await;
    assert!(wait_until(|| !client.is_heartbeat_running()).await);
    idle_cycles(5).await;

    assert_eq!(client.state(), ClientState::Unknown);
    assert_eq!(
        mock.methods(),
        vec![
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Get,
            HttpMethod::Delete,
        ]
    );
    assert!(client.cache().is_empty());
}

/// The final state reflects the cleanup deregistration
#[smol_potat::test]
async fn test_transport_failure_with_reachable_delete_ends_down() {
    let (client, mock) = test_client(test_config());
    mock.respond(HttpMethod::Put, MockReply::fail());

    client.register().await;
    assert!(wait_until(|| !client.is_heartbeat_running()).await);

    assert_eq!(client.state(), ClientState::Down);
    assert_eq!(mock.count(HttpMethod::Delete), 1);
    assert_eq!(mock.count(HttpMethod::Post), 1);
}

/// Renewals that keep getting rejected stop after the re-registration budget
#[smol_potat::test]
async fn test_reregistration_budget_is_bounded() {
    let mut config = test_config();
    config.heartbeat.max_reregistrations = 2;
    let (client, mock) = test_client(config);
    mock.respond(HttpMethod::Put, MockReply::status(410));

    client.register().await;
    assert!(wait_until(|| !client.is_heartbeat_running()).await);
    idle_cycles(5).await;

    assert_eq!(client.state(), ClientState::OutOfService);
    assert_eq!(mock.count(HttpMethod::Post), 3);
    assert_eq!(mock.count(HttpMethod::Put), 3);
    assert_eq!(mock.count(HttpMethod::Delete), 3);
    assert_eq!(mock.count(HttpMethod::Get), 0);
}

/// A successful renewal restores the full re-registration budget
#[smol_potat::test]
async fn test_successful_renew_resets_budget() {
    let mut config = test_config();
    config.heartbeat.max_reregistrations = 1;
    let (client, mock) = test_client(config);
    mock.enqueue(HttpMethod::Put, MockReply::status(404));
    mock.enqueue(HttpMethod::Put, MockReply::status(200));
    mock.enqueue(HttpMethod::Put, MockReply::status(404));

    client.register().await;
    assert!(wait_until(|| mock.count(HttpMethod::Put) >= 5).await);

    assert!(client.is_heartbeat_running());
    assert_eq!(client.state(), ClientState::Up);
    assert_eq!(mock.count(HttpMethod::Post), 3);

    client.shutdown().await;
}

/// A failed re-registration leaves the client out of service
#[smol_potat::test]
async fn test_failed_reregistration_is_out_of_service() {
    let (client, mock) = test_client(test_config());
    mock.enqueue(HttpMethod::Post, MockReply::status(204));
    mock.respond(HttpMethod::Post, MockReply::status(500));
    mock.respond(HttpMethod::Put, MockReply::status(404));

    assert_eq!(client.register().await, ClientState::Up);
    assert!(wait_until(|| !client.is_heartbeat_running()).await);
    idle_cycles(5).await;

    assert_eq!(client.state(), ClientState::OutOfService);
    assert_eq!(
        mock.methods(),
        vec![
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Delete,
            HttpMethod::Post,
        ]
    );
}

/// After the task ends on its own, register() starts a new one
#[smol_potat::test]
async fn test_register_again_after_task_ended() {
    let (client, mock) = test_client(test_config());
    mock.enqueue(HttpMethod::Put, MockReply::fail());

    client.register().await;
    assert!(wait_until(|| !client.is_heartbeat_running()).await);

    assert_eq!(client.register().await, ClientState::Up);
    assert!(client.is_heartbeat_running());
    assert_eq!(mock.count(HttpMethod::Post), 2);

    client.shutdown().await;
    assert_eq!(client.state(), ClientState::Down);
}

/// Shutdown while the task waits to re-register: the old registration is
/// already gone, so nothing else is sent
#[smol_potat::test]
async fn test_shutdown_during_reregistration_backoff() {
    let mut config = test_config();
    config.heartbeat.reregister_backoff_ms = 10_000;
    config.heartbeat.interval_ms = 10_000;
    let (client, mock) = test_client(config);
    mock.respond(HttpMethod::Put, MockReply::status(404));

    client.register().await;
    assert!(wait_until(|| mock.count(HttpMethod::Delete) == 1).await);

    client.shutdown().await;
    assert!(!client.is_heartbeat_running());
    assert_eq!(
        mock.methods(),
        vec![HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete]
    );
    assert_eq!(client.state(), ClientState::Down);
}

/// Dropping the last handle ends the task with exactly one deregistration
#[smol_potat::test]
async fn test_dropping_last_handle_deregisters_once() {
    let (client, mock) = test_client(test_config());

    client.register().await;
    assert!(wait_until(|| mock.count(HttpMethod::Get) >= 1).await);
    drop(client);

    assert!(wait_until(|| mock.count(HttpMethod::Delete) == 1).await);
    let renewals = mock.count(HttpMethod::Put);
    idle_cycles(10).await;

    assert_eq!(mock.count(HttpMethod::Put), renewals);
    assert_eq!(mock.count(HttpMethod::Delete), 1);
    assert_eq!(mock.count(HttpMethod::Post), 1);
}

/// The task keeps running while any clone is alive
#[smol_potat::test]
async fn test_task_outlives_dropped_clones() {
    let (client, mock) = test_client(test_config());
    let reader = client.clone();

    client.register().await;
    drop(client);
    idle_cycles(5).await;

    assert!(reader.is_heartbeat_running());
    assert_eq!(mock.count(HttpMethod::Delete), 0);

    reader.shutdown().await;
    assert_eq!(mock.count(HttpMethod::Delete), 1);
}

/// Deregistering while the task runs stops it first, so the withdrawn
/// instance is not renewed or registered again
#[smol_potat::test]
async fn test_deregister_while_running_stops_task() {
    let (client, mock) = test_client(test_config());

    client.register().await;
    assert!(wait_until(|| mock.count(HttpMethod::Get) >= 1).await);

    assert_eq!(client.deregister().await, ClientState::Down);
    assert!(!client.is_heartbeat_running());

    let calls = mock.requests().len();
    idle_cycles(5).await;

    assert_eq!(mock.requests().len(), calls);
    assert_eq!(mock.count(HttpMethod::Delete), 1);
    assert_eq!(mock.count(HttpMethod::Post), 1);
}
