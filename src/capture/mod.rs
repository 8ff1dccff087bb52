pub mod orchestrator;
pub mod permissions;
pub mod phase;

pub use orchestrator::{CaptureOrchestrator, CaptureOutcome};
pub use permissions::{HostPermissionProbe, PermissionProbe, PermissionStatus};
pub use phase::CapturePhase;
