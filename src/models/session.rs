use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed number of task slots a session may carry.
pub const TASK_SLOTS: usize = 3;

/// A period during which a session was auto-paused by system sleep or
/// screen lock. `resumed_at` and `duration_ms` stay `None` until the
/// machine wakes and the interruption is resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interruption {
    pub suspended_at: DateTime<Utc>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub user_reflection: Option<String>,
}

impl Interruption {
    pub fn open(suspended_at: DateTime<Utc>) -> Self {
        Self {
            suspended_at,
            resumed_at: None,
            duration_ms: None,
            user_reflection: None,
        }
    }

    /// Closes the interruption, computing its duration from the wall clock.
    pub fn resolve(&mut self, resumed_at: DateTime<Utc>) -> u64 {
        let duration_ms = resumed_at
            .signed_duration_since(self.suspended_at)
            .num_milliseconds()
            .max(0) as u64;
        self.resumed_at = Some(resumed_at);
        self.duration_ms = Some(duration_ms);
        duration_ms
    }

    pub fn is_resolved(&self) -> bool {
        self.resumed_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistractionReason {
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

/// Persisted session record. Owned by the session store once created; the
/// controller holds a live projection during an active session and writes
/// through on every append.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    /// Scheduled end. Extended by each resolved interruption's duration.
    pub ends_at: DateTime<Utc>,
    pub length_ms: u64,
    pub focus_goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<String>>,
    #[serde(default)]
    pub interruptions: Vec<Interruption>,
    #[serde(default)]
    pub distractions: Vec<DistractionReason>,
    #[serde(default)]
    pub reflections: Vec<Reflection>,
    #[serde(default)]
    pub summaries: Vec<String>,
    #[serde(default)]
    pub final_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Date folder the record is filed under, derived from its start time.
    pub fn date_folder(&self) -> String {
        date_folder_for(self.started_at)
    }
}

pub fn date_folder_for(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d").to_string()
}

/// Opaque, time-derived session id: millisecond timestamp plus a short
/// random suffix so two sessions started within the same millisecond
/// cannot collide.
pub fn new_session_id(started_at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", started_at.timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn interruption_resolve_computes_duration() {
        let start = Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap();
        let mut interruption = Interruption::open(start);
        assert!(!interruption.is_resolved());

        let duration = interruption.resolve(start + chrono::Duration::milliseconds(200_000));
        assert_eq!(duration, 200_000);
        assert_eq!(interruption.duration_ms, Some(200_000));
        assert!(interruption.is_resolved());
    }

    #[test]
    fn interruption_resolve_clamps_clock_skew_to_zero() {
        let start = Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap();
        let mut interruption = Interruption::open(start);
        let duration = interruption.resolve(start - chrono::Duration::seconds(5));
        assert_eq!(duration, 0);
    }

    #[test]
    fn session_id_is_prefixed_with_start_millis() {
        let start = Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap();
        let id = new_session_id(start);
        assert!(id.starts_with(&start.timestamp_millis().to_string()));
    }

    #[test]
    fn date_folder_uses_start_date() {
        let start = Utc.with_ymd_and_hms(2026, 3, 4, 23, 59, 0).unwrap();
        assert_eq!(date_folder_for(start), "2026-03-04");
    }
}
