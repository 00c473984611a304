//! Input capture for the Luxor observer.
//!
//! One listener thread per source writes into that source's [`EventBuffer`].
//! The platform backend is chosen at compile time.

pub mod buffer;
pub mod listener;
pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "macos")]
use macos as platform;

#[cfg(target_os = "windows")]
pub mod windows;
#[cfg(target_os = "windows")]
use self::windows as platform;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod noop;
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
use noop as platform;

// Re-export commonly used types
pub use buffer::{EventBuffer, SharedEventBuffer};
pub use listener::{spawn_listener, CaptureMode, CollectorError, EventSink};
pub use platform::check_permission;
pub use types::{ClickDetail, EventKind, EventRecord, InputSource, PointerButton};
