//! focusloop — a personal focus-session engine.
//!
//! Times work intervals, orchestrates periodic screen captures through the
//! host presentation layer, asks a multimodal model whether recent activity
//! matches the session's focus goal, and reconciles system sleep/lock
//! events with whatever is in flight. The host owns windows, rendering,
//! and transport; this crate owns the session lifecycle.

pub mod analysis;
pub mod capture;
pub mod error;
pub mod events;
pub mod models;
pub mod power;
pub mod session;
pub mod settings;
pub mod store;
pub mod timing;
pub mod utils;

pub use analysis::{AnalysisGateway, DistractionVerdict, FocusAnalyzer, FocusStatus};
pub use capture::{CaptureOrchestrator, CaptureOutcome, CapturePhase, HostPermissionProbe};
pub use error::SessionError;
pub use events::{CaptureRequester, EventSink, NullSink, SessionEvent};
pub use models::Session;
pub use power::{spawn_power_listener, PowerEvent};
pub use session::{SessionController, SessionSnapshot, SessionStatus};
pub use settings::SettingsStore;
pub use store::{ScreenshotStore, SessionStore};
