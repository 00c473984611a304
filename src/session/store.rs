//! Rolling state history with atomic persistence.
//!
//! The store keeps the newest `max_session_states` snapshots in memory and
//! writes a summary document (the newest [`PERSISTED_STATES`] snapshots plus
//! all-time counters) to disk. Writes go to a sibling temp file which is
//! fsynced and then renamed over the target, so the target is always either
//! absent or a complete JSON document.

use crate::config::ObserverConfig;
use crate::core::state::QuantumState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Number of states written to the session file.
pub const PERSISTED_STATES: usize = 100;

/// All-time event counts supplied by the caller at persist time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTotals {
    pub keyboard: u64,
    pub mouse: u64,
}

/// Config subset embedded in the session file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds
    pub observation_interval: f64,
    /// Seconds
    pub activity_window: u64,
}

/// Persisted session document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    pub session_start: DateTime<Utc>,
    pub total_states: u64,
    pub keyboard_events: u64,
    pub mouse_events: u64,
    /// Oldest first
    pub states: Vec<QuantumState>,
    pub config: SessionConfig,
}

/// Result of a successful persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistReport {
    pub states_written: usize,
    pub bytes: usize,
}

#[derive(Debug, Default)]
struct History {
    current: Option<QuantumState>,
    states: VecDeque<QuantumState>,
    total_recorded: u64,
}

/// Bounded history of emitted states.
#[derive(Debug)]
pub struct SessionStore {
    capacity: usize,
    path: PathBuf,
    config: SessionConfig,
    session_start: DateTime<Utc>,
    history: Mutex<History>,
    /// Serializes writers of the temp file
    write_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(config: &ObserverConfig) -> Self {
        Self::with_path(
            config.data_path(),
            config.max_session_states(),
            SessionConfig {
                observation_interval: config.observation_interval().as_secs_f64(),
                activity_window: config.activity_window(),
            },
        )
    }

    fn with_path(path: PathBuf, capacity: usize, config: SessionConfig) -> Self {
        Self {
            capacity: capacity.max(1),
            path,
            config,
            session_start: Utc::now(),
            history: Mutex::new(History::default()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn shared(config: &ObserverConfig) -> SharedSessionStore {
        Arc::new(Self::new(config))
    }

    fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `state` current and append it, evicting the oldest when full.
    pub fn record(&self, state: QuantumState) {
        let mut history = self.history();
        if history.states.len() >= self.capacity {
            history.states.pop_front();
        }
        history.states.push_back(state.clone());
        history.current = Some(state);
        history.total_recorded += 1;
    }

    /// Most recent state, if any has been recorded.
    pub fn current(&self) -> Option<QuantumState> {
        self.history().current.clone()
    }

    pub fn len(&self) -> usize {
        self.history().states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// States recorded since creation, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.history().total_recorded
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All retained states, oldest first.
    pub fn states(&self) -> Vec<QuantumState> {
        self.history().states.iter().cloned().collect()
    }

    /// Up to `n` newest states, oldest first.
    pub fn recent(&self, n: usize) -> Vec<QuantumState> {
        let history = self.history();
        let skip = history.states.len().saturating_sub(n);
        history.states.iter().skip(skip).cloned().collect()
    }

    /// Build the document that [`persist`](Self::persist) would write.
    pub fn snapshot(&self, totals: EventTotals) -> SessionFile {
        let (states, total_states) = {
            let history = self.history();
            let skip = history.states.len().saturating_sub(PERSISTED_STATES);
            let states: Vec<_> = history.states.iter().skip(skip).cloned().collect();
            (states, history.total_recorded)
        };

        SessionFile {
            session_start: self.session_start,
            total_states,
            keyboard_events: totals.keyboard,
            mouse_events: totals.mouse,
            states,
            config: self.config.clone(),
        }
    }

    /// Atomically write the session file.
    ///
    /// On failure the temp file is removed and the target is left untouched.
    pub fn persist(&self, totals: EventTotals) -> Result<PersistReport, PersistError> {
        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let document = self.snapshot(totals);
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| PersistError::Serialize(e.to_string()))?;

        let temp = temp_path(&self.path);
        if let Err(e) = write_then_rename(&temp, &self.path, &json) {
            if temp.exists() {
                if let Err(cleanup) = fs::remove_file(&temp) {
                    debug!(path = %temp.display(), error = %cleanup, "failed to remove temp file");
                }
            }
            return Err(e);
        }

        let report = PersistReport {
            states_written: document.states.len(),
            bytes: json.len(),
        };
        info!(
            path = %self.path.display(),
            states = report.states_written,
            bytes = report.bytes,
            "session saved"
        );
        Ok(report)
    }

    /// Read a persisted session file.
    pub fn load(path: &Path) -> Result<SessionFile, PersistError> {
        let content = fs::read_to_string(path).map_err(|e| PersistError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| PersistError::Serialize(e.to_string()))
    }

    /// Human-readable digest of the session so far.
    pub fn summary(&self, totals: EventTotals) -> String {
        let (retained, total, current) = {
            let history = self.history();
            (
                history.states.len(),
                history.total_recorded,
                history.current.clone(),
            )
        };
        let duration = (Utc::now() - self.session_start).num_seconds().max(0);

        let latest = match current {
            Some(state) => format!(
                "{} ({}, kb {:.3}/s, mouse {:.3}/s)",
                state.consciousness_level.label(),
                state.workflow_context,
                state.keyboard_activity,
                state.mouse_activity
            ),
            None => "none".to_string(),
        };

        format!(
            "Session Statistics:\n\
             - States recorded: {total} ({retained} retained)\n\
             - Keyboard events observed: {}\n\
             - Mouse events observed: {}\n\
             - Session duration: {duration} seconds\n\
             - Latest state: {latest}\n\
             - Session file: {}",
            totals.keyboard,
            totals.mouse,
            self.path.display()
        )
    }
}

pub type SharedSessionStore = Arc<SessionStore>;

/// `<file>.tmp` next to the target, so the rename stays on one filesystem.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_then_rename(temp: &Path, target: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
        }
    }

    let mut file = File::create(temp).map_err(|e| PersistError::io(temp, e))?;
    file.write_all(bytes).map_err(|e| PersistError::io(temp, e))?;
    file.sync_all().map_err(|e| PersistError::io(temp, e))?;
    drop(file);

    fs::rename(temp, target).map_err(|e| PersistError::io(target, e))?;

    // The file is complete either way; this only makes the rename durable
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if let Err(e) = sync_dir(dir) {
        debug!(dir = %dir.display(), error = %e, "could not sync session directory");
    }
    Ok(())
}

/// Flush a directory's entries to disk.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Errors from writing or reading the session file.
#[derive(Debug)]
pub enum PersistError {
    Serialize(String),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PersistError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        PersistError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistError::Serialize(e) => write!(f, "Session serialization failed: {e}"),
            PersistError::Io { path, source } => {
                write!(f, "Session I/O failed for {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Serialize(_) => None,
            PersistError::Io { source, .. } => Some(source),
        }
    }
}
