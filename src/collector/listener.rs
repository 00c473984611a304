//! Listener threads that feed the event buffers.
//!
//! Each input source gets its own thread and its own [`EventSink`]. The sink is
//! the only write path into that source's buffer.

use crate::clock;
use crate::collector::buffer::SharedEventBuffer;
use crate::collector::types::{EventKind, EventRecord, InputSource, PointerButton};
use crate::signal::RunSignal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

const IDLE_POLL: Duration = Duration::from_secs(1);

/// Write handle for one source's buffer.
#[derive(Debug)]
pub struct EventSink {
    source: InputSource,
    buffer: SharedEventBuffer,
    move_throttle: f64,
    /// Timestamp of the last recorded move, stored as f64 bits
    last_move: AtomicU64,
}

impl EventSink {
    pub fn new(source: InputSource, buffer: SharedEventBuffer, move_throttle: Duration) -> Self {
        Self {
            source,
            buffer,
            move_throttle: move_throttle.as_secs_f64(),
            last_move: AtomicU64::new(f64::NEG_INFINITY.to_bits()),
        }
    }

    pub fn source(&self) -> InputSource {
        self.source
    }

    /// Record a key press or release at the current time.
    pub fn key(&self, pressed: bool) {
        let now = clock::unix_seconds();
        self.record(if pressed {
            EventRecord::press(now)
        } else {
            EventRecord::release(now)
        });
    }

    /// Record a pointer move at the current time, subject to the throttle.
    pub fn pointer_move(&self) {
        self.record(EventRecord::movement(clock::unix_seconds()));
    }

    /// Record a pointer button transition at the current time.
    pub fn click(&self, button: PointerButton, pressed: bool) {
        self.record(EventRecord::click(clock::unix_seconds(), button, pressed));
    }

    /// Record `event`, returning whether it was kept.
    ///
    /// Moves closer than the throttle to the previous recorded move are
    /// dropped. Events of the other source are ignored.
    pub fn record(&self, event: EventRecord) -> bool {
        if event.source() != self.source {
            return false;
        }

        if event.kind == EventKind::Move {
            let last = f64::from_bits(self.last_move.load(Ordering::Relaxed));
            if event.timestamp - last <= self.move_throttle {
                return false;
            }
            self.last_move
                .store(event.timestamp.to_bits(), Ordering::Relaxed);
        }

        self.buffer.record(event);
        true
    }
}

/// How a listener captures input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Use the platform's system-wide input hooks
    Platform,
    /// Capture nothing; the listener idles until stopped
    Disabled,
}

/// Spawn the listener thread for `sink`'s source.
///
/// The thread exits once `signal` stops. A backend failure (missing
/// permission, hook installation) ends only this listener.
pub fn spawn_listener(
    sink: Arc<EventSink>,
    mode: CaptureMode,
    signal: Arc<RunSignal>,
) -> Result<JoinHandle<()>, CollectorError> {
    let source = sink.source();

    thread::Builder::new()
        .name(format!("luxor-{source}"))
        .spawn(move || {
            let result = match mode {
                CaptureMode::Platform => super::platform::run_event_loop(&sink, &signal),
                CaptureMode::Disabled => {
                    info!(%source, "input capture disabled, listener idle");
                    idle(&signal);
                    Ok(())
                }
            };

            if let Err(e) = result {
                error!(%source, error = %e, "input listener failed");
            }
            debug!(%source, "input listener exited");
        })
        .map_err(|e| CollectorError::Spawn(e.to_string()))
}

/// Park until the signal stops.
pub(crate) fn idle(signal: &RunSignal) {
    while signal.sleep(IDLE_POLL) {}
}

/// Errors that can occur during event collection.
#[derive(Debug)]
pub enum CollectorError {
    Spawn(String),
    PermissionDenied,
    TapCreationFailed,
    RunLoopSourceFailed,
    HookInstallationFailed,
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::Spawn(e) => write!(f, "Failed to spawn listener thread: {e}"),
            CollectorError::PermissionDenied => {
                write!(f, "Input Monitoring permission not granted")
            }
            CollectorError::TapCreationFailed => write!(f, "Failed to create CGEvent tap"),
            CollectorError::RunLoopSourceFailed => {
                write!(f, "Failed to create run loop source")
            }
            CollectorError::HookInstallationFailed => {
                write!(f, "Failed to install Windows hook")
            }
        }
    }
}

impl std::error::Error for CollectorError {}
