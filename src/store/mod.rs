pub mod screenshots;
pub mod sessions;

pub use screenshots::{SavedScreenshot, ScreenshotStore};
pub use sessions::SessionStore;
