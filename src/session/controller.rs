//! Sole owner and mutator of the live session state.
//!
//! The controller arbitrates the session-end and periodic-analysis timers,
//! delegates capture cadence to the orchestrator, and reconciles power
//! events with whatever is in flight. All entry points go through one
//! mutex; `start_session` is a compare-and-swap against the idle state.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};

use crate::analysis::{DistractionVerdict, FocusAnalyzer, FocusStatus, SummaryContext};
use crate::capture::CaptureOrchestrator;
use crate::error::SessionError;
use crate::events::{EventSink, SessionEvent};
use crate::models::{DistractionReason, Reflection};
use crate::settings::SettingsStore;
use crate::store::{ScreenshotStore, SessionStore};
use crate::timing::{schedule_after, SystemClock, TimerSlot, WallClock};

use super::state::{SessionSnapshot, SessionState, SessionStatus};

#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    end_timer: Arc<Mutex<TimerSlot>>,
    analysis_timer: Arc<Mutex<TimerSlot>>,
    store: SessionStore,
    screenshots: ScreenshotStore,
    analyzer: Arc<dyn FocusAnalyzer>,
    capture: CaptureOrchestrator,
    settings: Arc<SettingsStore>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn WallClock>,
}

impl SessionController {
    pub fn new(
        store: SessionStore,
        screenshots: ScreenshotStore,
        analyzer: Arc<dyn FocusAnalyzer>,
        capture: CaptureOrchestrator,
        settings: Arc<SettingsStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self::with_clock(
            store,
            screenshots,
            analyzer,
            capture,
            settings,
            events,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        store: SessionStore,
        screenshots: ScreenshotStore,
        analyzer: Arc<dyn FocusAnalyzer>,
        capture: CaptureOrchestrator,
        settings: Arc<SettingsStore>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            end_timer: Arc::new(Mutex::new(TimerSlot::new())),
            analysis_timer: Arc::new(Mutex::new(TimerSlot::new())),
            store,
            screenshots,
            analyzer,
            capture,
            settings,
            events,
            clock,
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot(self.clock.now())
    }

    pub async fn start_session(
        &self,
        length_ms: u64,
        focus_goal: &str,
        tasks: Option<Vec<String>>,
    ) -> Result<SessionSnapshot, SessionError> {
        if length_ms == 0 {
            return Err(SessionError::InvalidLength);
        }

        let now = self.clock.now();
        {
            // The state lock is held until the timers are armed, so a
            // concurrent stop cannot slip between the status flip and the
            // arming and leave orphan timers running against an idle state.
            let mut state = self.state.lock().await;
            if state.status != SessionStatus::Idle {
                return Err(SessionError::AlreadyActive);
            }
            let session = self
                .store
                .create_session(now, length_ms, focus_goal, tasks)
                .map_err(SessionError::Store)?;
            info!("session {} started ({length_ms} ms)", session.id);
            state.begin(session);

            let capture = self.settings.capture();
            self.capture
                .enable(
                    Duration::from_millis(capture.initial_delay_ms),
                    Duration::from_millis(capture.interval_ms),
                )
                .await;
            self.arm_end_timer(length_ms).await;
            self.arm_analysis_timer().await;
        }

        Ok(self.broadcast_state().await)
    }

    /// Idempotent teardown: cancels all timers, best-effort synthesizes the
    /// final summary, clears the live projection, broadcasts. Safe with no
    /// active session.
    pub async fn stop_session(&self) {
        let finished = {
            // Timer slots are only ever touched under the state lock, in
            // state-then-slot order.
            let mut state = self.state.lock().await;
            self.end_timer.lock().await.cancel();
            self.analysis_timer.lock().await.cancel();
            let session = state.session.take();
            if let Some(open) = state.open_interruption.take() {
                info!(
                    "discarding unresolved interruption opened at {}",
                    open.suspended_at
                );
            }
            state.clear();
            session
        };

        let Some(mut session) = finished else {
            self.broadcast_state().await;
            return;
        };

        self.capture.disable().await;
        self.broadcast_state().await;

        // Summary synthesis is best-effort and happens after the state is
        // already cleared, so a slow or failing model call cannot wedge the
        // lifecycle.
        let context = SummaryContext {
            focus_goal: session.focus_goal.clone(),
            summaries: session.summaries.clone(),
            interruptions: session.interruptions.clone(),
            distractions: session.distractions.clone(),
            reflections: session.reflections.clone(),
        };
        if let Some(text) = self.analyzer.generate_final_summary(&context).await {
            if let Err(err) =
                self.store
                    .set_final_summary(&session.id, &session.date_folder(), &text)
            {
                warn!("failed to persist final summary for {}: {err:#}", session.id);
            }
            session.final_summary = Some(text);
        }

        info!("session {} stopped", session.id);
        self.events.emit(SessionEvent::SessionCompleted {
            session_id: session.id.clone(),
            session,
        });
    }

    /// Reaction to a suspend or lock signal. No-op without an active session.
    pub async fn pause_session(&self) {
        let now = self.clock.now();
        {
            let mut state = self.state.lock().await;
            if state.status != SessionStatus::Active {
                return;
            }
            let remaining = state.remaining_ms(now).max(0) as u64;
            state.remaining_at_pause_ms = Some(remaining);
            state.open_interruption = Some(crate::models::Interruption::open(now));
            state.status = SessionStatus::Paused;
            info!("session paused with {remaining} ms remaining");

            self.end_timer.lock().await.cancel();
            self.analysis_timer.lock().await.cancel();
            self.capture.pause().await;
        }

        self.broadcast_state().await;
    }

    /// Reaction to a resume or unlock signal. Resolves the open
    /// interruption and auto-resumes with a synthesized reflection rather
    /// than waiting for user input.
    pub async fn handle_system_wake(&self) {
        let now = self.clock.now();
        let duration_ms = {
            let mut state = self.state.lock().await;
            let Some(open) = state.open_interruption.as_mut() else {
                return;
            };
            if open.is_resolved() {
                return;
            }
            open.resolve(now)
        };

        let minutes = duration_ms as f64 / 60_000.0;
        let reflection =
            format!("Away for {minutes:.1} minutes (system sleep or screen lock); auto-resumed.");
        if let Err(err) = self.resume_after_interruption(&reflection).await {
            warn!("auto-resume after wake failed: {err}");
        }
    }

    /// Stores the reflection on the open interruption, persists it, extends
    /// the session end by the interruption's duration, and re-arms all
    /// three timers from the remaining time captured at pause.
    pub async fn resume_after_interruption(
        &self,
        reflection: &str,
    ) -> Result<SessionSnapshot, SessionError> {
        let now = self.clock.now();
        let (session_id, date_folder, interruption) = {
            let mut state = self.state.lock().await;
            let Some(mut interruption) = state.open_interruption.take() else {
                return Err(SessionError::NoActiveInterruption);
            };
            if !interruption.is_resolved() {
                interruption.resolve(now);
            }
            interruption.user_reflection = Some(reflection.to_string());

            let remaining_ms = state.remaining_at_pause_ms.take().unwrap_or(0);
            let Some(session) = state.session.as_mut() else {
                return Err(SessionError::NoActiveInterruption);
            };
            session.ends_at = now + chrono::Duration::milliseconds(remaining_ms as i64);
            session.interruptions.push(interruption.clone());
            let session_id = session.id.clone();
            let date_folder = session.date_folder();
            state.status = SessionStatus::Active;

            self.arm_end_timer(remaining_ms).await;
            self.arm_analysis_timer().await;
            self.capture.resume().await;
            (session_id, date_folder, interruption)
        };

        // Store failure is logged, never rolls back the in-memory resume.
        if let Err(err) = self
            .store
            .add_interruption(&session_id, &date_folder, &interruption)
        {
            warn!("failed to persist interruption for {session_id}: {err:#}");
        }

        Ok(self.broadcast_state().await)
    }

    /// Persists the open interruption with the reflection, then stops.
    pub async fn end_after_interruption(&self, reflection: &str) -> Result<(), SessionError> {
        let now = self.clock.now();
        let (session_id, date_folder, interruption) = {
            let mut state = self.state.lock().await;
            let Some(mut interruption) = state.open_interruption.take() else {
                return Err(SessionError::NoActiveInterruption);
            };
            if !interruption.is_resolved() {
                interruption.resolve(now);
            }
            interruption.user_reflection = Some(reflection.to_string());

            let Some(session) = state.session.as_mut() else {
                return Err(SessionError::NoActiveInterruption);
            };
            session.interruptions.push(interruption.clone());
            (session.id.clone(), session.date_folder(), interruption)
        };

        if let Err(err) = self
            .store
            .add_interruption(&session_id, &date_folder, &interruption)
        {
            warn!("failed to persist interruption for {session_id}: {err:#}");
        }

        self.stop_session().await;
        Ok(())
    }

    /// User-initiated reflection outside interruption bookkeeping. Appends
    /// the reflection; if the session sits paused without an open
    /// interruption, re-arms the timers from the captured remaining time.
    pub async fn save_reflection_and_resume(
        &self,
        reflection: &str,
    ) -> Result<SessionSnapshot, SessionError> {
        let now = self.clock.now();
        let (session_id, date_folder, record) = {
            let mut state = self.state.lock().await;
            if state.session.is_none() {
                return Err(SessionError::NoActiveSession);
            }
            let resume_remaining = if state.status == SessionStatus::Paused
                && state.open_interruption.is_none()
            {
                state.remaining_at_pause_ms.take()
            } else {
                None
            };

            let session = state.session.as_mut().expect("checked above");
            let record = Reflection {
                timestamp: now,
                content: reflection.to_string(),
            };
            session.reflections.push(record.clone());
            if let Some(remaining_ms) = resume_remaining {
                session.ends_at = now + chrono::Duration::milliseconds(remaining_ms as i64);
            }
            let session_id = session.id.clone();
            let date_folder = session.date_folder();
            if let Some(remaining_ms) = resume_remaining {
                state.status = SessionStatus::Active;
                self.arm_end_timer(remaining_ms).await;
                self.arm_analysis_timer().await;
                self.capture.resume().await;
            }
            (session_id, date_folder, record)
        };

        if let Err(err) = self.store.add_reflection(&session_id, &date_folder, &record) {
            warn!("failed to persist reflection for {session_id}: {err:#}");
        }

        Ok(self.broadcast_state().await)
    }

    /// Appends a user reflection, then stops the session.
    pub async fn save_reflection_and_end_session(
        &self,
        reflection: &str,
    ) -> Result<(), SessionError> {
        let now = self.clock.now();
        let (session_id, date_folder, record) = {
            let mut state = self.state.lock().await;
            let Some(session) = state.session.as_mut() else {
                return Err(SessionError::NoActiveSession);
            };
            let record = Reflection {
                timestamp: now,
                content: reflection.to_string(),
            };
            session.reflections.push(record.clone());
            (session.id.clone(), session.date_folder(), record)
        };

        if let Err(err) = self.store.add_reflection(&session_id, &date_folder, &record) {
            warn!("failed to persist reflection for {session_id}: {err:#}");
        }

        self.stop_session().await;
        Ok(())
    }

    /// Appends a user-noted distraction to the live session and its
    /// persisted record.
    pub async fn record_distraction(
        &self,
        reason: &str,
    ) -> Result<SessionSnapshot, SessionError> {
        let now = self.clock.now();
        let (session_id, date_folder, record) = {
            let mut state = self.state.lock().await;
            if !state.is_active() {
                return Err(SessionError::NoActiveSession);
            }
            let session = state.session.as_mut().expect("active implies session");
            let record = DistractionReason {
                timestamp: now,
                content: reason.to_string(),
            };
            session.distractions.push(record.clone());
            (session.id.clone(), session.date_folder(), record)
        };

        if let Err(err) = self
            .store
            .add_distraction(&session_id, &date_folder, &record)
        {
            warn!("failed to persist distraction for {session_id}: {err:#}");
        }

        Ok(self.broadcast_state().await)
    }

    /// Classifies the `limit` most recent screenshots. On success the
    /// analysis text is appended to the active session's summaries; the
    /// verdict is returned either way for UI signaling.
    pub async fn handle_distraction_analysis(
        &self,
        limit: usize,
    ) -> Result<DistractionVerdict, SessionError> {
        let files = self
            .screenshots
            .list_recent(limit)
            .map_err(SessionError::Store)?;
        if files.is_empty() {
            return Err(SessionError::NoImages);
        }

        let mut images = Vec::with_capacity(files.len());
        for file in &files {
            match self.screenshots.read_data_url(file) {
                Ok(url) => images.push(url),
                Err(err) => warn!("skipping unreadable screenshot {}: {err:#}", file.display()),
            }
        }
        if images.is_empty() {
            return Err(SessionError::NoImages);
        }

        let (focus_goal, tasks) = {
            let state = self.state.lock().await;
            match &state.session {
                Some(session) => (session.focus_goal.clone(), session.tasks.clone()),
                None => (String::new(), None),
            }
        };

        let verdict = self
            .analyzer
            .analyze_screenshots(&images, &focus_goal, tasks.as_deref())
            .await?;

        let append_target = {
            let mut state = self.state.lock().await;
            if state.is_active() {
                let line = verdict_summary_line(&verdict);
                let session = state.session.as_mut().expect("active implies session");
                session.summaries.push(line.clone());
                Some((session.id.clone(), session.date_folder(), line))
            } else {
                None
            }
        };

        if let Some((session_id, date_folder, line)) = append_target {
            if let Err(err) = self.store.add_summary(&session_id, &date_folder, &line) {
                warn!("failed to persist analysis summary for {session_id}: {err:#}");
            }
        }

        Ok(verdict)
    }

    /// Re-evaluates whether the periodic-analysis timer should run after a
    /// settings change. Idempotent.
    pub async fn handle_settings_change(&self) {
        let state = self.state.lock().await;
        if state.status == SessionStatus::Active {
            self.arm_analysis_timer().await;
        } else {
            self.analysis_timer.lock().await.cancel();
        }
    }

    async fn arm_end_timer(&self, remaining_ms: u64) {
        let controller = self.clone();
        let handle = schedule_after(Duration::from_millis(remaining_ms), async move {
            info!("session clock elapsed");
            // Detached so stop_session cancelling the end-timer slot cannot
            // cancel the stop in progress.
            tokio::spawn(async move { controller.stop_session().await });
        });
        self.end_timer.lock().await.replace(handle);
    }

    /// Arms (or re-arms) the periodic analysis ticker. Demo mode leaves it
    /// off.
    async fn arm_analysis_timer(&self) {
        let mut slot = self.analysis_timer.lock().await;
        slot.cancel();
        if self.settings.demo_mode() {
            return;
        }

        let analysis = self.settings.analysis();
        let period = Duration::from_millis(analysis.interval_ms);
        let limit = analysis.recent_image_limit;
        let controller = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match controller.handle_distraction_analysis(limit).await {
                    Ok(verdict) => info!("periodic analysis verdict: {:?}", verdict.status),
                    Err(err) => warn!("periodic analysis skipped: {err}"),
                }
            }
        });
        slot.replace(handle);
    }

    async fn broadcast_state(&self) -> SessionSnapshot {
        let snapshot = { self.state.lock().await.snapshot(self.clock.now()) };
        self.events.emit(SessionEvent::StateChanged {
            snapshot: snapshot.clone(),
        });
        snapshot
    }
}

fn verdict_summary_line(verdict: &DistractionVerdict) -> String {
    let status = match verdict.status {
        FocusStatus::Focused => "focused",
        FocusStatus::Distracted => "distracted",
    };
    match verdict.analysis.as_deref() {
        Some(analysis) if !analysis.is_empty() => format!("{status}: {analysis}"),
        _ => status.to_string(),
    }
}
