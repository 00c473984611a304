//! Fallback backend for targets without a system-wide input hook.
//!
//! This exists so the crate (and binary) build everywhere. The listener
//! records nothing and idles until the run signal stops.

use crate::collector::listener::{idle, CollectorError, EventSink};
use crate::signal::RunSignal;
use std::sync::Arc;
use tracing::info;

/// Idle until stopped; no system events are captured on this platform.
pub fn run_event_loop(sink: &Arc<EventSink>, signal: &RunSignal) -> Result<(), CollectorError> {
    info!(
        source = %sink.source(),
        "system input capture is not supported on this platform"
    );
    idle(signal);
    Ok(())
}

/// On these platforms there is no Input Monitoring permission gate.
pub fn check_permission() -> bool {
    true
}
