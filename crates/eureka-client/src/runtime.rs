//! Runtime-agnostic spawning and timers
//!
//! The heartbeat loop runs as an independent task. The client does not pick
//! an executor; callers hand it a [`Spawner`] for whichever runtime they use.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed task accepted by a [`Spawner`]
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A spawner that can run futures in the background
pub trait Spawner: Send + Sync {
    /// Spawn a future and detach it
    fn spawn(&self, future: Task);
}

/// Spawner for the smol global executor
#[derive(Debug, Clone, Copy, Default)]
pub struct SmolSpawner;

impl Spawner for SmolSpawner {
    fn spawn(&self, future: Task) {
        smol::spawn(future).detach();
    }
}

/// Spawner for the ambient tokio runtime
#[cfg(feature = "tokio")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

#[cfg(feature = "tokio")]
impl Spawner for TokioSpawner {
    fn spawn(&self, future: Task) {
        tokio::spawn(future);
    }
}

/// Sleep for the specified duration.
///
/// `smol::Timer` is driven by its own reactor thread, so this works under
/// any executor.
pub async fn sleep(duration: Duration) {
    smol::Timer::after(duration).await;
}
