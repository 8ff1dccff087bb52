pub mod session;

pub use session::{
    new_session_id, DistractionReason, Interruption, Reflection, Session, TASK_SLOTS,
};
