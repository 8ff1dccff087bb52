//! Host power signals.
//!
//! Suspend and lock both pause the session; resume and unlock both hand
//! control to the wake path, which auto-resumes. The host feeds events into
//! an unbounded channel; a listener task maps them onto controller calls so
//! the engine never blocks the platform's event loop.

use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::session::SessionController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    Suspend,
    Resume,
    LockScreen,
    UnlockScreen,
}

/// Spawns the listener task. Dropping the sender ends it.
pub fn spawn_power_listener(
    controller: SessionController,
    mut events: mpsc::UnboundedReceiver<PowerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!("power event: {event:?}");
            match event {
                PowerEvent::Suspend | PowerEvent::LockScreen => {
                    controller.pause_session().await;
                }
                PowerEvent::Resume | PowerEvent::UnlockScreen => {
                    controller.handle_system_wake().await;
                }
            }
        }
        info!("power event source closed");
    })
}
