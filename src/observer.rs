//! Observer lifecycle.
//!
//! [`Observer`] owns the configuration and the long-lived shared state (event
//! buffers, app context cache, session store) and runs the four producers:
//!
//! - keyboard listener
//! - pointer listener
//! - app context probe
//! - activity analyzer
//!
//! Each producer is a named thread watching one [`RunSignal`]. Stopping clears
//! the signal, joins every thread with a bounded wait, and flushes the session
//! file once more.

use crate::collector::{
    spawn_listener, CaptureMode, CollectorError, EventBuffer, EventSink, InputSource,
    SharedEventBuffer,
};
use crate::config::ObserverConfig;
use crate::context::{default_probe, AppContextProbe, ContextCache, SharedContextCache, SystemProbe};
use crate::core::{event_totals, ActivityAnalyzer, QuantumState};
use crate::session::{EventTotals, SessionStore, SharedSessionStore};
use crate::signal::RunSignal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const JOIN_POLL: Duration = Duration::from_millis(10);

/// Builds the OS probe for each run.
pub type ProbeFactory = Box<dyn Fn() -> Box<dyn SystemProbe> + Send + Sync>;

/// Where the observer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    Idle,
    Running,
    Stopping,
}

impl std::fmt::Display for ObserverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObserverState::Idle => write!(f, "idle"),
            ObserverState::Running => write!(f, "running"),
            ObserverState::Stopping => write!(f, "stopping"),
        }
    }
}

struct Worker {
    name: String,
    handle: JoinHandle<()>,
}

struct Lifecycle {
    state: ObserverState,
    signal: Option<Arc<RunSignal>>,
    workers: Vec<Worker>,
}

pub struct Observer {
    config: ObserverConfig,
    capture_mode: CaptureMode,
    probe_factory: ProbeFactory,
    keyboard: SharedEventBuffer,
    pointer: SharedEventBuffer,
    context: SharedContextCache,
    store: SharedSessionStore,
    lifecycle: Mutex<Lifecycle>,
}

impl Observer {
    /// Create an idle observer using platform capture and the OS probe.
    pub fn new(config: ObserverConfig) -> Self {
        let command_timeout = config.probe().command_timeout;

        Self {
            keyboard: EventBuffer::shared(config.max_events_memory()),
            pointer: EventBuffer::shared(config.max_events_memory()),
            context: ContextCache::shared(),
            store: SessionStore::shared(&config),
            capture_mode: CaptureMode::Platform,
            probe_factory: Box::new(move || default_probe(command_timeout)),
            lifecycle: Mutex::new(Lifecycle {
                state: ObserverState::Idle,
                signal: None,
                workers: Vec::new(),
            }),
            config,
        }
    }

    /// Replace how the OS probe is built.
    pub fn with_probe<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn SystemProbe> + Send + Sync + 'static,
    {
        self.probe_factory = Box::new(factory);
        self
    }

    /// Replace how the listeners capture input.
    pub fn with_capture_mode(mut self, mode: CaptureMode) -> Self {
        self.capture_mode = mode;
        self
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    pub fn state(&self) -> ObserverState {
        self.lifecycle().state
    }

    /// Most recent classified snapshot.
    pub fn current_state(&self) -> Option<QuantumState> {
        self.store.current()
    }

    pub fn store(&self) -> &SharedSessionStore {
        &self.store
    }

    pub fn keyboard_buffer(&self) -> &SharedEventBuffer {
        &self.keyboard
    }

    pub fn pointer_buffer(&self) -> &SharedEventBuffer {
        &self.pointer
    }

    /// All-time event counts.
    pub fn event_totals(&self) -> EventTotals {
        event_totals(&self.keyboard, &self.pointer)
    }

    /// Human-readable digest of the session so far.
    pub fn summary(&self) -> String {
        self.store.summary(self.event_totals())
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the producers. Only valid while idle.
    pub fn start(&self) -> Result<(), LifecycleError> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state != ObserverState::Idle {
            return Err(LifecycleError::InvalidState(lifecycle.state));
        }

        let signal = RunSignal::shared();
        let mut workers = Vec::new();

        if let Err(e) = self.spawn_workers(&signal, &mut workers) {
            signal.stop();
            self.join_all(workers);
            return Err(e);
        }

        info!(
            keyboard = self.config.sources().keyboard,
            mouse = self.config.sources().mouse,
            workers = workers.len(),
            data_file = %self.store.path().display(),
            "observer started"
        );

        lifecycle.state = ObserverState::Running;
        lifecycle.signal = Some(signal);
        lifecycle.workers = workers;
        Ok(())
    }

    fn spawn_workers(
        &self,
        signal: &Arc<RunSignal>,
        workers: &mut Vec<Worker>,
    ) -> Result<(), LifecycleError> {
        let sources = self.config.sources();
        let listeners = [
            (sources.keyboard, InputSource::Keyboard, &self.keyboard),
            (sources.mouse, InputSource::Pointer, &self.pointer),
        ];

        for (enabled, source, buffer) in listeners {
            if !enabled {
                debug!(%source, "source disabled");
                continue;
            }
            let sink = Arc::new(EventSink::new(
                source,
                buffer.clone(),
                self.config.mouse_move_throttle(),
            ));
            let handle = spawn_listener(sink, self.capture_mode, signal.clone())?;
            workers.push(Worker {
                name: format!("{source} listener"),
                handle,
            });
        }

        let probe = AppContextProbe::new(
            (self.probe_factory)(),
            self.context.clone(),
            self.config.probe().clone(),
        );
        workers.push(spawn_worker("app probe", signal, move |signal| probe.run(signal))?);

        let analyzer = ActivityAnalyzer::new(
            &self.config,
            self.keyboard.clone(),
            self.pointer.clone(),
            self.context.clone(),
            self.store.clone(),
        );
        workers.push(spawn_worker("analyzer", signal, move |signal| {
            analyzer.run(signal)
        })?);

        Ok(())
    }

    /// Stop the producers, flush the session file, and return to idle.
    ///
    /// Returns `false` without doing anything unless the observer is running.
    pub fn stop(&self) -> bool {
        let (signal, workers) = {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state != ObserverState::Running {
                return false;
            }
            lifecycle.state = ObserverState::Stopping;
            (lifecycle.signal.take(), std::mem::take(&mut lifecycle.workers))
        };

        info!("stopping observer");
        if let Some(signal) = signal {
            signal.stop();
        }

        // Flush after the joins so the last analyzer tick is included
        self.join_all(workers);

        if let Err(e) = self.store.persist(self.event_totals()) {
            error!(error = %e, "final save failed");
        }

        self.lifecycle().state = ObserverState::Idle;
        info!("observer stopped");
        true
    }

    fn join_all(&self, workers: Vec<Worker>) {
        let timeout = self.config.shutdown_timeout();
        for worker in workers {
            join_with_timeout(worker, timeout);
        }
    }

    /// Start, block until `shutdown` is set, then stop.
    ///
    /// `shutdown` is checked every `observation_interval`.
    pub fn run(&self, shutdown: &AtomicBool) -> Result<(), LifecycleError> {
        self.start()?;

        while !shutdown.load(Ordering::SeqCst) && self.state() == ObserverState::Running {
            thread::sleep(self.config.observation_interval());
        }

        self.stop();
        Ok(())
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_worker<F>(name: &str, signal: &Arc<RunSignal>, body: F) -> Result<Worker, LifecycleError>
where
    F: FnOnce(&RunSignal) + Send + 'static,
{
    let signal = signal.clone();
    let handle = thread::Builder::new()
        .name(format!("luxor-{}", name.replace(' ', "-")))
        .spawn(move || body(&signal))
        .map_err(|e| LifecycleError::Spawn(format!("{name}: {e}")))?;

    Ok(Worker {
        name: name.to_string(),
        handle,
    })
}

/// Join `worker`, abandoning it after `timeout`. Returns whether it finished.
fn join_with_timeout(worker: Worker, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;

    while !worker.handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(
                worker = %worker.name,
                timeout_secs = timeout.as_secs_f64(),
                "worker did not stop in time, abandoning it"
            );
            return false;
        }
        thread::sleep(JOIN_POLL);
    }

    if worker.handle.join().is_err() {
        error!(worker = %worker.name, "worker panicked");
    }
    true
}

/// Errors from lifecycle transitions.
#[derive(Debug)]
pub enum LifecycleError {
    InvalidState(ObserverState),
    Spawn(String),
}

impl From<CollectorError> for LifecycleError {
    fn from(e: CollectorError) -> Self {
        LifecycleError::Spawn(e.to_string())
    }
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleError::InvalidState(state) => {
                write!(f, "Observer cannot start while {state}")
            }
            LifecycleError::Spawn(e) => write!(f, "Failed to spawn worker: {e}"),
        }
    }
}

impl std::error::Error for LifecycleError {}
