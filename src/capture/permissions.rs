//! Screen-recording permission probe.
//!
//! On macOS this goes through the CoreGraphics preflight check; elsewhere
//! the permission model does not apply and capture is always allowed.

#[derive(Debug, Clone, PartialEq)]
pub enum PermissionStatus {
    Granted,
    Denied { reason: String },
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

pub trait PermissionProbe: Send + Sync {
    fn screen_recording(&self) -> PermissionStatus;
}

/// Probe backed by the host OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostPermissionProbe;

#[cfg(target_os = "macos")]
#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGPreflightScreenCaptureAccess() -> bool;
}

impl PermissionProbe for HostPermissionProbe {
    fn screen_recording(&self) -> PermissionStatus {
        #[cfg(target_os = "macos")]
        {
            if unsafe { CGPreflightScreenCaptureAccess() } {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied {
                    reason: "screen recording access not granted; enable it in \
                             System Settings > Privacy & Security > Screen Recording"
                        .to_string(),
                }
            }
        }

        #[cfg(not(target_os = "macos"))]
        {
            PermissionStatus::Granted
        }
    }
}
