//! Screenshot capture orchestration.
//!
//! Decouples "when to ask for a frame" from "whether the ask succeeded".
//! A cadence loop fires capture requests on a fixed interval; results come
//! back asynchronously from the presentation layer and are absorbed into a
//! bounded-retry state machine. Capture and save failures never propagate
//! upward; in the worst case the orchestrator parks in `Error` and starts a
//! fresh cycle at the next interval.
//!
//! In-flight work is never force-cancelled. Every result handler re-checks
//! the current phase on arrival and silently drops anything stale, which is
//! the sole cancellation mechanism at this boundary.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::events::{CaptureRequester, EventSink, SessionEvent};
use crate::store::ScreenshotStore;
use crate::timing::{schedule_after, TimerSlot};

use super::permissions::{PermissionProbe, PermissionStatus};
use super::phase::CapturePhase;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Reply from the presentation layer to a capture request.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    Captured {
        data_url: String,
        captured_at: DateTime<Utc>,
    },
    Failed {
        error: String,
    },
}

struct CadenceTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct CaptureOrchestrator {
    phase: Arc<Mutex<CapturePhase>>,
    cadence: Arc<Mutex<Option<CadenceTask>>>,
    retry: Arc<Mutex<TimerSlot>>,
    schedule: Arc<Mutex<(Duration, Duration)>>,
    requester: Arc<dyn CaptureRequester>,
    permissions: Arc<dyn PermissionProbe>,
    store: ScreenshotStore,
    events: Arc<dyn EventSink>,
}

impl CaptureOrchestrator {
    pub fn new(
        requester: Arc<dyn CaptureRequester>,
        permissions: Arc<dyn PermissionProbe>,
        store: ScreenshotStore,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            phase: Arc::new(Mutex::new(CapturePhase::Disabled)),
            cadence: Arc::new(Mutex::new(None)),
            retry: Arc::new(Mutex::new(TimerSlot::new())),
            schedule: Arc::new(Mutex::new((Duration::ZERO, Duration::from_secs(120)))),
            requester,
            permissions,
            store,
            events,
        }
    }

    pub async fn phase(&self) -> CapturePhase {
        self.phase.lock().await.clone()
    }

    /// Arms the capture cadence for a new session. The first request fires
    /// after `initial_delay`, then every `interval`.
    pub async fn enable(&self, initial_delay: Duration, interval: Duration) {
        {
            let mut phase = self.phase.lock().await;
            *phase = match self.permissions.screen_recording() {
                PermissionStatus::Granted => CapturePhase::Idle,
                PermissionStatus::Denied { reason } => {
                    log_warn!("screen capture unavailable: {reason}");
                    CapturePhase::PermissionDenied { reason }
                }
            };
            self.emit_phase(&phase);
        }

        *self.schedule.lock().await = (initial_delay, interval);
        self.spawn_cadence(initial_delay, interval).await;
    }

    /// Tears the subsystem down at session end.
    pub async fn disable(&self) {
        self.cancel_cadence().await;
        self.retry.lock().await.cancel();
        let mut phase = self.phase.lock().await;
        *phase = CapturePhase::Disabled;
        self.emit_phase(&phase);
    }

    /// Stops the timers but leaves the phase tag untouched, preserving
    /// failure and permission context across a power pause.
    pub async fn pause(&self) {
        self.cancel_cadence().await;
        self.retry.lock().await.cancel();
    }

    /// Restarts the cadence after a power pause.
    pub async fn resume(&self) {
        {
            let mut phase = self.phase.lock().await;
            match &*phase {
                CapturePhase::Disabled => return,
                // A pause landed mid-operation; the pending result will be
                // discarded on arrival, so restart from a clean slate.
                CapturePhase::Capturing { .. } | CapturePhase::Saving { .. } => {
                    *phase = CapturePhase::Idle;
                    self.emit_phase(&phase);
                }
                CapturePhase::PermissionDenied { .. } => {
                    if let PermissionStatus::Granted = self.permissions.screen_recording() {
                        *phase = CapturePhase::Idle;
                        self.emit_phase(&phase);
                    }
                }
                CapturePhase::Idle | CapturePhase::Error { .. } => {}
            }
        }

        let (initial_delay, interval) = *self.schedule.lock().await;
        self.spawn_cadence(initial_delay, interval).await;
    }

    /// Only exit from `Capturing`. Results arriving in any other phase are
    /// stale leftovers from before a pause or disable and are discarded.
    pub async fn handle_capture_result(&self, outcome: CaptureOutcome) {
        let (data_url, captured_at, retry_count) = {
            let mut phase = self.phase.lock().await;
            let CapturePhase::Capturing { retry_count } = &*phase else {
                log_info!("discarding capture result arriving in phase {:?}", *phase);
                return;
            };
            let retry_count = *retry_count;

            match outcome {
                CaptureOutcome::Failed { error } => {
                    log_warn!("capture attempt {retry_count} failed: {error}");
                    *phase = CapturePhase::Error {
                        message: error,
                        retry_count,
                    };
                    self.emit_phase(&phase);
                    drop(phase);
                    self.schedule_retry(retry_count).await;
                    return;
                }
                CaptureOutcome::Captured {
                    data_url,
                    captured_at,
                } => {
                    *phase = CapturePhase::Saving {
                        data_url: data_url.clone(),
                        captured_at,
                        retry_count,
                    };
                    self.emit_phase(&phase);
                    (data_url, captured_at, retry_count)
                }
            }
        };

        let store = self.store.clone();
        let saved = tokio::task::spawn_blocking(move || store.save(&data_url, captured_at)).await;

        let mut phase = self.phase.lock().await;
        // The subsystem may have been disabled or reset while the write was
        // in flight; in that case the save result no longer matters.
        if !matches!(*phase, CapturePhase::Saving { .. }) {
            log_info!("discarding save result arriving in phase {:?}", *phase);
            return;
        }

        match saved {
            Ok(Ok(screenshot)) => {
                log_info!(
                    "saved screenshot {} ({} bytes)",
                    screenshot.file.display(),
                    screenshot.bytes
                );
                *phase = CapturePhase::Idle;
                self.emit_phase(&phase);
            }
            Ok(Err(err)) => {
                log_warn!("screenshot save failed: {err:#}");
                *phase = CapturePhase::Error {
                    message: err.to_string(),
                    retry_count,
                };
                self.emit_phase(&phase);
                drop(phase);
                self.schedule_retry(retry_count).await;
            }
            Err(join_err) => {
                log_warn!("screenshot save worker failed to join: {join_err}");
                *phase = CapturePhase::Error {
                    message: join_err.to_string(),
                    retry_count,
                };
                self.emit_phase(&phase);
                drop(phase);
                self.schedule_retry(retry_count).await;
            }
        }
    }

    async fn spawn_cadence(&self, initial_delay: Duration, interval: Duration) {
        self.cancel_cadence().await;

        let token = CancellationToken::new();
        let loop_token = token.clone();
        let orchestrator = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(Instant::now() + initial_delay, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => orchestrator.on_interval_tick().await,
                    _ = loop_token.cancelled() => {
                        log_info!("capture cadence shutting down");
                        break;
                    }
                }
            }
        });

        *self.cadence.lock().await = Some(CadenceTask { token, handle });
    }

    async fn cancel_cadence(&self) {
        if let Some(task) = self.cadence.lock().await.take() {
            task.token.cancel();
            task.handle.abort();
        }
    }

    /// Host-initiated capture, same entry point as an interval tick: fires
    /// only from `Idle` or `Error`.
    pub async fn trigger_capture(&self) {
        self.on_interval_tick().await;
    }

    async fn on_interval_tick(&self) {
        let (trigger, was_error) = {
            let mut phase = self.phase.lock().await;
            match &*phase {
                CapturePhase::Idle => {
                    *phase = CapturePhase::Capturing { retry_count: 0 };
                    self.emit_phase(&phase);
                    (true, false)
                }
                // A failed cycle, exhausted or mid-retry, yields to the
                // fresh interval: reset and begin again from scratch.
                CapturePhase::Error { .. } => {
                    *phase = CapturePhase::Capturing { retry_count: 0 };
                    self.emit_phase(&phase);
                    (true, true)
                }
                // Previous cycle still in flight, or nothing to do.
                CapturePhase::Capturing { .. }
                | CapturePhase::Saving { .. }
                | CapturePhase::PermissionDenied { .. }
                | CapturePhase::Disabled => (false, false),
            }
        };

        if was_error {
            self.retry.lock().await.cancel();
        }
        if trigger {
            self.requester.request_capture();
        }
    }

    async fn schedule_retry(&self, failed_count: u32) {
        if failed_count >= MAX_RETRIES {
            log_warn!(
                "capture retries exhausted ({failed_count}); parking until next interval"
            );
            return;
        }

        let orchestrator = self.clone();
        let handle = schedule_after(RETRY_DELAY, async move {
            let mut phase = orchestrator.phase.lock().await;
            // Only retry the failure that scheduled us; anything else means
            // the machine moved on while we slept.
            let CapturePhase::Error { retry_count, .. } = &*phase else {
                return;
            };
            if *retry_count != failed_count {
                return;
            }
            *phase = CapturePhase::Capturing {
                retry_count: failed_count + 1,
            };
            orchestrator.emit_phase(&phase);
            drop(phase);
            orchestrator.requester.request_capture();
        });
        self.retry.lock().await.replace(handle);
    }

    fn emit_phase(&self, phase: &CapturePhase) {
        self.events.emit(SessionEvent::CapturePhaseChanged {
            phase: phase.clone(),
        });
    }
}
