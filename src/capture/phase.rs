use chrono::{DateTime, Utc};
use serde::Serialize;

/// State of the periodic screenshot subsystem. Never persisted; lives only
/// inside the orchestrator for one session and is broadcast so the
/// presentation layer can surface permission and failure states.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum CapturePhase {
    Disabled,
    Idle,
    #[serde(rename_all = "camelCase")]
    PermissionDenied { reason: String },
    #[serde(rename_all = "camelCase")]
    Capturing { retry_count: u32 },
    #[serde(rename_all = "camelCase")]
    Saving {
        #[serde(skip_serializing)]
        data_url: String,
        captured_at: DateTime<Utc>,
        retry_count: u32,
    },
    #[serde(rename_all = "camelCase")]
    Error { message: String, retry_count: u32 },
}

impl CapturePhase {
    pub fn is_disabled(&self) -> bool {
        matches!(self, CapturePhase::Disabled)
    }
}
