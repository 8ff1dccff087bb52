use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp;

use crate::models::{Interruption, Session};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Idle,
    Active,
    Paused,
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Idle
    }
}

/// Live, mutable projection of the one active session. The controller is
/// its sole owner; every append is written through to the session store.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub status: SessionStatus,
    pub session: Option<Session>,
    /// Interruption opened by a suspend/lock signal, cleared on resolution.
    pub open_interruption: Option<Interruption>,
    /// Time left on the session clock, captured at the moment of a pause.
    pub remaining_at_pause_ms: Option<u64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.status != SessionStatus::Idle && self.session.is_some()
    }

    pub fn begin(&mut self, session: Session) {
        *self = Self {
            status: SessionStatus::Active,
            session: Some(session),
            open_interruption: None,
            remaining_at_pause_ms: None,
        };
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        match self.status {
            SessionStatus::Idle => 0,
            SessionStatus::Paused => self.remaining_at_pause_ms.unwrap_or(0) as i64,
            SessionStatus::Active => {
                let ends_at = match &self.session {
                    Some(session) => session.ends_at,
                    None => return 0,
                };
                cmp::max(ends_at.signed_duration_since(now).num_milliseconds(), 0)
            }
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            session_id: self.session.as_ref().map(|session| session.id.clone()),
            started_at: self.session.as_ref().map(|session| session.started_at),
            ends_at: self.session.as_ref().map(|session| session.ends_at),
            length_ms: self.session.as_ref().map(|session| session.length_ms),
            focus_goal: self.session.as_ref().map(|session| session.focus_goal.clone()),
            tasks: self.session.as_ref().and_then(|session| session.tasks.clone()),
            remaining_ms: self.remaining_ms(now),
            interruption_open: self.open_interruption.is_some(),
        }
    }
}

/// Serializable view broadcast to the presentation layer on every state
/// change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub length_ms: Option<u64>,
    pub focus_goal: Option<String>,
    pub tasks: Option<Vec<String>>,
    pub remaining_ms: i64,
    pub interruption_open: bool,
}
