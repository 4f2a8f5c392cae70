//! Registration lifecycle
//!
//! [`EurekaClient`] owns the registration status of this process and drives
//! the register → heartbeat → deregister sequence:
//!
//! - `register()` posts a freshly built descriptor. On 200/204 the state is
//!   `UP` and a heartbeat task is spawned.
//! - The heartbeat task renews the lease and downloads the registry view
//!   once per interval. A rejected renewal deregisters and registers again
//!   (bounded, with backoff). A transport failure on either call stops the
//!   task for good.
//! - Whatever ends the task, it deregisters exactly once on its way out.
//!   `shutdown()` is the deterministic way to end it; dropping the last
//!   client handle ends it too.
//!
//! No operation returns an error: outcomes are reported through
//! [`ClientState`] and the log.

use crate::{
    cache::RegistryCache,
    config::ClientConfig,
    descriptor::build_descriptor,
    error::Result,
    models::{ClientState, InstanceDescriptor, InstanceEnvelope, RegistrySnapshot},
    runtime::{Spawner, sleep},
    transport::{HttpMethod, HttpRequest, Transport},
};
use futures::FutureExt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Handle to the registration lifecycle of this process.
///
/// Construct one at startup and clone it to whoever needs to read the
/// status or the discovered services; clones share all state. When the
/// last handle is dropped a running heartbeat task stops and deregisters.
#[derive(Clone)]
pub struct EurekaClient {
    shared: Arc<Shared>,
    control: Arc<Control>,
}

/// State the heartbeat task works on
struct Shared {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    state: StateCell,
    cache: RegistryCache,
    /// Descriptor of the last registration attempt
    descriptor: Mutex<Option<InstanceDescriptor>>,
}

/// Owner side of the heartbeat task, never shared with it
struct Control {
    spawner: Arc<dyn Spawner>,
    heartbeat: Mutex<Option<HeartbeatHandle>>,
    /// Serializes register(), deregister() and shutdown()
    lifecycle: futures::lock::Mutex<()>,
}

struct HeartbeatHandle {
    /// Dropping this ends the task
    stop: async_channel::Sender<()>,
    /// Closed once the heartbeat task has finished
    done: async_channel::Receiver<()>,
}

impl HeartbeatHandle {
    fn is_running(&self) -> bool {
        !self.done.is_closed()
    }
}

/// Atomic status cell; every read and write is synchronized
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: ClientState) -> Self {
        Self(AtomicU8::new(Self::encode(state)))
    }

    fn encode(state: ClientState) -> u8 {
        match state {
            ClientState::Up => 0,
            ClientState::Down => 1,
            ClientState::OutOfService => 2,
            ClientState::Unknown => 3,
        }
    }

    fn decode(value: u8) -> ClientState {
        match value {
            0 => ClientState::Up,
            1 => ClientState::Down,
            2 => ClientState::OutOfService,
            _ => ClientState::Unknown,
        }
    }

    fn get(&self) -> ClientState {
        Self::decode(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: ClientState) {
        let previous = Self::decode(self.0.swap(Self::encode(state), Ordering::SeqCst));
        if previous != state {
            info!("Eureka client state: {} -> {}", previous, state);
        }
    }
}

/// Outcome of one renewal
enum Renewal {
    Renewed,
    Rejected,
    Failed,
}

/// Why a run of heartbeat cycles ended
#[derive(Debug)]
enum LoopExit {
    Stopped,
    RenewRejected,
    TransportFailure,
}

impl EurekaClient {
    /// Create a client. Nothing is sent until [`register`](Self::register).
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        spawner: Arc<dyn Spawner>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                transport,
                state: StateCell::new(ClientState::OutOfService),
                cache: RegistryCache::new(),
                descriptor: Mutex::new(None),
            }),
            control: Arc::new(Control {
                spawner,
                heartbeat: Mutex::new(None),
                lifecycle: futures::lock::Mutex::new(()),
            }),
        })
    }

    /// Create a client on the reqwest transport with the configured retry
    /// policy. Must be used from within a tokio runtime.
    #[cfg(feature = "reqwest")]
    pub fn with_reqwest(config: ClientConfig, spawner: Arc<dyn Spawner>) -> Result<Self> {
        use crate::transport::{ReqwestTransport, RetryingTransport};

        let transport = RetryingTransport::new(ReqwestTransport::new()?, &config.transport);
        Self::new(config, Arc::new(transport), spawner)
    }

    /// Current status
    pub fn state(&self) -> ClientState {
        self.shared.state.get()
    }

    /// Discovered services, updated by every successful fetch
    pub fn cache(&self) -> &RegistryCache {
        &self.shared.cache
    }

    /// Configuration the client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Descriptor of the last registration attempt
    pub fn descriptor(&self) -> Option<InstanceDescriptor> {
        self.shared.descriptor()
    }

    /// Whether a heartbeat task is alive
    pub fn is_heartbeat_running(&self) -> bool {
        lock(&self.control.heartbeat)
            .as_ref()
            .is_some_and(HeartbeatHandle::is_running)
    }

    /// Register this process and start the heartbeat task.
    ///
    /// Without a registry URL this only sets `OUT_OF_SERVICE` (standalone
    /// mode). While a heartbeat task is alive this is a no-op.
    pub async fn register(&self) -> ClientState {
        let _guard = self.control.lifecycle.lock().await;

        if self.shared.config.is_standalone() {
            warn!("Eureka service URL is empty, running in standalone mode");
            self.shared.state.set(ClientState::OutOfService);
            return ClientState::OutOfService;
        }

        if self.is_heartbeat_running() {
            warn!("Eureka client is already registered, ignoring register request");
            return self.state();
        }

        if self.shared.try_register().await {
            self.start_heartbeat();
        }
        self.state()
    }

    /// Remove the last registered descriptor from the registry.
    ///
    /// A running heartbeat task is stopped first and performs the
    /// deregistration itself, so the instance is not registered again.
    /// Safe to call repeatedly; a later call only updates the state with
    /// whatever the registry answers.
    pub async fn deregister(&self) -> ClientState {
        let _guard = self.control.lifecycle.lock().await;

        if self.stop_heartbeat().await {
            return self.state();
        }
        self.shared.deregister().await
    }

    /// Stop the heartbeat task and wait until it has deregistered.
    ///
    /// No-op when no task is running.
    pub async fn shutdown(&self) {
        let _guard = self.control.lifecycle.lock().await;
        self.stop_heartbeat().await;
    }

    /// Signal the task and wait for it. Returns whether a live task was
    /// stopped.
    async fn stop_heartbeat(&self) -> bool {
        let handle = lock(&self.control.heartbeat).take();
        let Some(handle) = handle else {
            return false;
        };
        if !handle.is_running() {
            return false;
        }

        info!("Stopping Eureka heartbeat");
        let _ = handle.stop.try_send(());
        // Resolves with an error once the task drops its end
        let _ = handle.done.recv().await;
        true
    }

    fn start_heartbeat(&self) {
        let (stop_tx, stop_rx) = async_channel::bounded(1);
        let (done_tx, done_rx) = async_channel::bounded::<()>(1);

        *lock(&self.control.heartbeat) = Some(HeartbeatHandle {
            stop: stop_tx,
            done: done_rx,
        });

        let shared = self.shared.clone();
        self.control.spawner.spawn(Box::pin(async move {
            shared.heartbeat_loop(stop_rx).await;
            drop(done_tx);
        }));
    }
}

impl Shared {
    fn descriptor(&self) -> Option<InstanceDescriptor> {
        lock(&self.descriptor).clone()
    }

    async fn deregister(&self) -> ClientState {
        if self.config.is_standalone() {
            return self.state.get();
        }

        let Some(descriptor) = self.descriptor() else {
            debug!("Eureka client has nothing to deregister");
            return self.state.get();
        };

        let url = self.config.apps_url(&[&descriptor.app, &descriptor.instance_id]);
        let state = match self.send(HttpMethod::Delete, url).await {
            Err(e) => {
                error!("Eureka deregistration of {} failed: {}", descriptor.instance_id, e);
                ClientState::Unknown
            }
            Ok(response) if response.is_success() => {
                info!("Eureka deregistered {}", descriptor.instance_id);
                ClientState::Down
            }
            Ok(response) => {
                warn!(
                    "Eureka deregistration rejected: {} {}",
                    response.status, response.body
                );
                ClientState::Unknown
            }
        };
        self.state.set(state);
        state
    }

    /// Build a descriptor and POST it. Returns whether the registry
    /// accepted it.
    async fn try_register(&self) -> bool {
        let descriptor = build_descriptor(&self.config.instance);
        let url = self.config.apps_url(&[&descriptor.app]);

        let body = match InstanceEnvelope::encode(&descriptor) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to encode instance descriptor: {}", e);
                self.state.set(ClientState::OutOfService);
                return false;
            }
        };

        info!("Trying to register to Eureka: {}", url);
        let instance_id = descriptor.instance_id.clone();
        *lock(&self.descriptor) = Some(descriptor);

        let request = self.request(HttpMethod::Post, url).with_json_body(body);
        match self.transport.send(request).await {
            Err(e) => {
                error!("Eureka registration failed: {}", e);
                self.state.set(ClientState::OutOfService);
                false
            }
            Ok(response) if matches!(response.status, 200 | 204) => {
                info!("Eureka registration succeeded for {}", instance_id);
                self.state.set(ClientState::Up);
                true
            }
            Ok(response) => {
                warn!(
                    "Eureka registration rejected: {} {}",
                    response.status, response.body
                );
                self.state.set(ClientState::OutOfService);
                false
            }
        }
    }

    async fn heartbeat_loop(&self, stop: async_channel::Receiver<()>) {
        let heartbeat = &self.config.heartbeat;
        let mut reregistrations = 0u32;

        loop {
            let exit = self.heartbeat_cycles(&stop, &mut reregistrations).await;
            debug!("Eureka heartbeat cycles ended: {:?}", exit);

            // One deregistration per registration, whatever the exit reason
            self.deregister().await;

            match exit {
                LoopExit::Stopped => {
                    info!("Eureka heartbeat stopped");
                    return;
                }
                LoopExit::TransportFailure => {
                    warn!("Eureka heartbeat terminated after a transport failure");
                    return;
                }
                LoopExit::RenewRejected => {
                    reregistrations += 1;
                    if reregistrations > heartbeat.max_reregistrations {
                        error!(
                            "Eureka renewals rejected {} times in a row, giving up",
                            reregistrations
                        );
                        self.state.set(ClientState::OutOfService);
                        return;
                    }

                    let delay = heartbeat.reregister_delay(reregistrations);
                    if wait_or_stop(&stop, delay).await {
                        info!("Eureka heartbeat stopped before re-registration");
                        return;
                    }

                    info!(
                        "Re-registering with Eureka (attempt {}/{})",
                        reregistrations, heartbeat.max_reregistrations
                    );
                    if !self.try_register().await {
                        return;
                    }
                }
            }
        }
    }

    /// Renew, fetch, sleep; repeat until something ends the run
    async fn heartbeat_cycles(
        &self,
        stop: &async_channel::Receiver<()>,
        reregistrations: &mut u32,
    ) -> LoopExit {
        let interval = self.config.heartbeat.interval();

        loop {
            match self.renew().await {
                Renewal::Renewed => *reregistrations = 0,
                Renewal::Rejected => return LoopExit::RenewRejected,
                Renewal::Failed => return LoopExit::TransportFailure,
            }

            if !self.fetch_registry().await {
                return LoopExit::TransportFailure;
            }

            if wait_or_stop(stop, interval).await {
                return LoopExit::Stopped;
            }
        }
    }

    async fn renew(&self) -> Renewal {
        let Some(descriptor) = self.descriptor() else {
            return Renewal::Failed;
        };

        let url = self.config.apps_url(&[&descriptor.app, &descriptor.instance_id]);
        match self.send(HttpMethod::Put, url).await {
            Err(e) => {
                error!("Eureka renew failed: {}", e);
                self.state.set(ClientState::Unknown);
                Renewal::Failed
            }
            Ok(response) if response.is_success() => Renewal::Renewed,
            Ok(response) => {
                self.state.set(ClientState::Unknown);
                warn!("Eureka renew rejected: {} {}", response.status, response.body);
                Renewal::Rejected
            }
        }
    }

    /// Download the registry view. Returns false only on transport failure.
    async fn fetch_registry(&self) -> bool {
        let url = self.config.apps_url(&[]);
        let response = match self.send(HttpMethod::Get, url).await {
            Ok(response) => response,
            Err(e) => {
                error!("Eureka application fetch failed: {}", e);
                self.state.set(ClientState::Unknown);
                return false;
            }
        };

        if response.status != 200 {
            debug!(
                "Eureka application fetch returned {}, keeping cached view",
                response.status
            );
            return true;
        }

        // A body that does not decode must not touch the cache
        match RegistrySnapshot::from_json(&response.body) {
            Ok(snapshot) => {
                self.cache.apply(&snapshot);
                self.state.set(ClientState::Up);
            }
            Err(e) => {
                warn!(
                    "Eureka application list could not be decoded, keeping cached view: {}",
                    e
                );
            }
        }
        true
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .with_timeout(Duration::from_millis(self.config.transport.timeout_ms))
    }

    async fn send(
        &self,
        method: HttpMethod,
        url: String,
    ) -> std::result::Result<crate::transport::HttpResponse, crate::error::TransportError> {
        self.transport.send(self.request(method, url)).await
    }
}

/// Sleep for `delay` unless a stop signal arrives first. Returns true when
/// stopped. The sender is dropped along with the last client handle, which
/// counts as a stop signal.
async fn wait_or_stop(stop: &async_channel::Receiver<()>, delay: Duration) -> bool {
    let timer = sleep(delay).fuse();
    let stopped = stop.recv().fuse();
    futures::pin_mut!(timer, stopped);

    futures::select! {
        _ = timer => false,
        _ = stopped => true,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
