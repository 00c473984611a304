//! Periodic reduction of raw input into classified snapshots.
//!
//! Every tick the analyzer counts each buffer's events inside the trailing
//! activity window, classifies the result together with the latest app
//! context, and records the snapshot in the session store. Every
//! `auto_save_interval` it also asks the store to persist.

use crate::clock;
use crate::collector::SharedEventBuffer;
use crate::config::ObserverConfig;
use crate::context::SharedContextCache;
use crate::core::classify::{classify_consciousness, classify_workflow};
use crate::core::state::{round3, QuantumState};
use crate::session::{EventTotals, PersistError, PersistReport, SharedSessionStore};
use crate::signal::RunSignal;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, error};

pub struct ActivityAnalyzer {
    window_secs: f64,
    auto_save_secs: f64,
    display_interval: Duration,
    keyboard: SharedEventBuffer,
    pointer: SharedEventBuffer,
    context: SharedContextCache,
    store: SharedSessionStore,
    /// Unix seconds of the last auto-save attempt
    last_save: f64,
}

impl ActivityAnalyzer {
    pub fn new(
        config: &ObserverConfig,
        keyboard: SharedEventBuffer,
        pointer: SharedEventBuffer,
        context: SharedContextCache,
        store: SharedSessionStore,
    ) -> Self {
        Self {
            window_secs: config.activity_window() as f64,
            auto_save_secs: config.auto_save_interval().as_secs_f64(),
            display_interval: config.display_interval(),
            keyboard,
            pointer,
            context,
            store,
            last_save: clock::unix_seconds(),
        }
    }

    /// Compute the snapshot for time `now` (unix seconds) without recording it.
    pub fn analyze(&self, now: f64) -> QuantumState {
        let threshold = now - self.window_secs;
        let keyboard_activity = rate(self.keyboard.count_since(threshold), self.window_secs);
        let mouse_activity = rate(self.pointer.count_since(threshold), self.window_secs);

        let context = self.context.latest();

        QuantumState {
            timestamp: clock::to_datetime(now),
            active_apps: context.running.clone(),
            keyboard_activity,
            mouse_activity,
            workflow_context: classify_workflow(&context.active),
            consciousness_level: classify_consciousness(keyboard_activity, mouse_activity),
        }
    }

    /// Analyze, record the snapshot, and persist if an auto-save is due.
    ///
    /// The snapshot stays recorded even when persisting fails.
    pub fn tick(&mut self, now: f64) -> Result<QuantumState, PersistError> {
        let state = self.analyze(now);
        debug!(
            keyboard = state.keyboard_activity,
            mouse = state.mouse_activity,
            workflow = %state.workflow_context,
            level = %state.consciousness_level,
            "state tick"
        );
        self.store.record(state.clone());

        if now - self.last_save >= self.auto_save_secs {
            self.last_save = now;
            self.persist()?;
        }

        Ok(state)
    }

    /// Persist the store with the current all-time event counts.
    pub fn persist(&self) -> Result<PersistReport, PersistError> {
        self.store.persist(event_totals(&self.keyboard, &self.pointer))
    }

    /// Tick until the signal stops.
    pub fn run(mut self, signal: &RunSignal) {
        debug!("activity analyzer started");
        let interval = self.display_interval;
        tick_loop(signal, interval, || self.tick(clock::unix_seconds()).map(|_| ()));
        debug!("activity analyzer stopped");
    }
}

/// Call `step` every `interval` until the signal stops.
///
/// A failed step is logged. A panicking step is logged and the loop carries
/// on with the next interval.
fn tick_loop<F>(signal: &RunSignal, interval: Duration, mut step: F)
where
    F: FnMut() -> Result<(), PersistError>,
{
    while signal.is_running() {
        match panic::catch_unwind(AssertUnwindSafe(&mut step)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "auto-save failed"),
            Err(_) => error!("unexpected error in analyzer loop"),
        }
        signal.sleep(interval);
    }
}

/// All-time counts of both buffers.
pub fn event_totals(keyboard: &SharedEventBuffer, pointer: &SharedEventBuffer) -> EventTotals {
    EventTotals {
        keyboard: keyboard.total_recorded(),
        mouse: pointer.total_recorded(),
    }
}

fn rate(count: usize, window_secs: f64) -> f64 {
    round3((count as f64 / window_secs).max(0.0))
}
