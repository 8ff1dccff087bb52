//! Outbound boundary to the presentation layer.
//!
//! The engine never talks to a window directly; it emits [`SessionEvent`]s
//! through an [`EventSink`] and asks for frames through a
//! [`CaptureRequester`]. The host wires both to its own transport.

use serde::Serialize;

use crate::capture::CapturePhase;
use crate::models::Session;
use crate::session::SessionSnapshot;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    StateChanged { snapshot: SessionSnapshot },
    #[serde(rename_all = "camelCase")]
    SessionCompleted { session_id: String, session: Session },
    #[serde(rename_all = "camelCase")]
    CapturePhaseChanged { phase: CapturePhase },
}

/// Receives broadcast events. Implementations must be cheap and
/// non-blocking; delivery is best-effort.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent);
}

/// Sink that drops everything. Default for headless use and tests that do
/// not inspect broadcasts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: SessionEvent) {}
}

/// Fire-and-forget "capture a frame now" signal to the presentation layer.
/// The reply arrives asynchronously through
/// [`CaptureOrchestrator::handle_capture_result`](crate::CaptureOrchestrator::handle_capture_result).
pub trait CaptureRequester: Send + Sync {
    fn request_capture(&self);
}
