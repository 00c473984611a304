//! Foreground application context.
//!
//! This module contains:
//! - The shared context cache read by the analyzer
//! - The OS probe capability and its implementations
//! - The refresh loop that keeps the cache current

pub mod monitor;
pub mod probe;
pub mod types;

// Re-export commonly used types
pub use monitor::{AppContextProbe, RefreshOutcome};
pub use probe::{default_probe, NullProbe, OsProbe, ProbeError, SystemProbe};
pub use types::{AppContext, ContextCache, SharedContextCache};
