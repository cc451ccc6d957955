//! Delayed background work.
//!
//! Both deferred actions of the session lifecycle (the startup profile sync
//! and the post-expiry redirect) run through [`ScheduledTask`], so they can be
//! cancelled and so tests can drive them with tokio's paused clock.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

/// A future scheduled to run once after a fixed delay.
///
/// Dropping the handle does not cancel the task; call [`ScheduledTask::cancel`].
#[derive(Debug)]
pub struct ScheduledTask {
    delay: Duration,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawn `task` on the current tokio runtime, to run after `delay`.
    ///
    /// Returns `None` (and the task never runs) when called outside a runtime.
    pub fn after<F>(delay: Duration, task: F) -> Option<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "No tokio runtime, dropping scheduled task");
                return None;
            }
        };
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Some(Self { delay, handle })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Abort the task. No effect if it already ran.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task. Returns `true` if it ran to completion,
    /// `false` if it was cancelled or panicked.
    pub async fn join(self) -> bool {
        self.handle.await.is_ok()
    }
}
