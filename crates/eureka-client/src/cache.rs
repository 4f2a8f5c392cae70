//! Locally cached view of the registry
//!
//! The cache maps lower-cased application names to the instances last seen
//! for them. It is written only by successful fetches and read by whatever
//! routes calls to peers. A snapshot is applied under one write lock, so
//! readers see either the old entries or the new ones, never a mix.

use crate::models::{DiscoveredInstance, RegistrySnapshot};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

/// Full published view: lower-cased application name to instances
pub type CacheView = HashMap<String, Vec<DiscoveredInstance>>;

/// Updates buffered per subscriber before newer ones are dropped
const SUBSCRIBER_BUFFER: usize = 16;

#[derive(Debug, Default)]
struct CacheInner {
    applications: CacheView,
    last_refreshed: Option<DateTime<Utc>>,
}

/// Shared registry cache handle; clones share the same storage
#[derive(Debug, Clone, Default)]
pub struct RegistryCache {
    inner: Arc<RwLock<CacheInner>>,
    subscribers: Arc<Mutex<Vec<async_channel::Sender<CacheView>>>>,
}

impl RegistryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry of every application named in the snapshot and
    /// publish the resulting view. Entries for applications absent from the
    /// snapshot are left untouched.
    pub fn apply(&self, snapshot: &RegistrySnapshot) -> CacheView {
        let view = {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            for app in &snapshot.applications {
                inner
                    .applications
                    .insert(app.name.to_lowercase(), app.instances.clone());
            }
            inner.last_refreshed = Some(Utc::now());
            inner.applications.clone()
        };

        debug!("application refresh: {} applications cached", view.len());
        self.publish(&view);
        view
    }

    /// Instances of an application, looked up case-insensitively
    pub fn instances(&self, app_name: &str) -> Option<Vec<DiscoveredInstance>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.applications.get(&app_name.to_lowercase()).cloned()
    }

    /// Copy of the whole cache
    pub fn view(&self) -> CacheView {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.applications.clone()
    }

    /// Number of cached applications
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.applications.len()
    }

    /// Whether nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When the last snapshot was applied
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.last_refreshed
    }

    /// Receive the full view after every applied snapshot
    pub fn subscribe(&self) -> async_channel::Receiver<CacheView> {
        let (tx, rx) = async_channel::bounded(SUBSCRIBER_BUFFER);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    fn publish(&self, view: &CacheView) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| match tx.try_send(view.clone()) {
            Ok(()) => true,
            Err(async_channel::TrySendError::Full(_)) => {
                debug!("cache subscriber is lagging, dropping update");
                true
            }
            Err(async_channel::TrySendError::Closed(_)) => false,
        });
    }
}
