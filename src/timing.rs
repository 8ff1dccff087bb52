//! Abortable one-shot and repeating timer handles.
//!
//! Timers are plain tokio tasks held in a slot; replacing or cancelling a
//! slot aborts the previous task. Cancellation is synchronous and total.
//! Tests drive these deterministically with tokio's paused clock.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

/// Source of wall-clock timestamps. Injectable so session arithmetic can be
/// tested against a manual clock instead of real waits.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Holder for a single cancelable timer task.
#[derive(Debug, Default)]
pub struct TimerSlot {
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new task, aborting whichever one was there before.
    pub fn replace(&mut self, handle: JoinHandle<()>) {
        if let Some(previous) = self.handle.take() {
            previous.abort();
        }
        self.handle = Some(handle);
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs `action` once after `delay`.
pub fn schedule_after<F>(delay: Duration, action: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        action.await;
    })
}
