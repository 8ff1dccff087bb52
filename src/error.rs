use thiserror::Error;

use crate::analysis::AnalysisError;

/// Typed failures surfaced by [`SessionController`](crate::SessionController)
/// operations. Validation failures leave all state untouched.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session is already active")]
    AlreadyActive,

    #[error("no session is active")]
    NoActiveSession,

    #[error("no interruption is open for the active session")]
    NoActiveInterruption,

    #[error("session length must be greater than zero")]
    InvalidLength,

    #[error("no recent screenshots available for analysis")]
    NoImages,

    #[error("session store failure: {0:#}")]
    Store(anyhow::Error),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}
