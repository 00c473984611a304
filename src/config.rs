//! Configuration for the Luxor observer.
//!
//! [`ObserverSettings`] is the raw, editable form loaded from disk or built in
//! code. [`ObserverConfig`] is the validated form every component consumes; it
//! can only be obtained through validation and never changes afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Name of the per-user directory used for config and data.
pub const APP_DIR_NAME: &str = "luxor-observer";

/// Default session file name.
pub const DEFAULT_DATA_FILE: &str = "blackmamba_quantum_session.json";

const MAX_EVENTS_MEMORY_RANGE: (usize, usize) = (10, 100_000);
const MAX_SESSION_STATES_RANGE: (usize, usize) = (10, 10_000);
const ACTIVITY_WINDOW_RANGE: (u64, u64) = (1, 300);
const AUTO_SAVE_INTERVAL_RANGE: (u64, u64) = (5, 3600);
const MAX_RUNNING_RANGE: (usize, usize) = (1, 15);

/// Raw observer settings, as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverSettings {
    /// How often the lifecycle driver checks for a stop request
    #[serde(with = "duration_secs")]
    pub observation_interval: Duration,

    /// Trailing window for event rates, in seconds
    pub activity_window: u64,

    /// Capacity of each event buffer
    pub max_events_memory: usize,

    /// Capacity of the in-memory state history
    pub max_session_states: usize,

    /// Session file name, relative to `data_dir`
    pub data_file: String,

    /// Directory holding the session file
    pub data_dir: PathBuf,

    /// Seconds between automatic session flushes
    pub auto_save_interval: u64,

    /// Time between analyzer ticks
    #[serde(with = "duration_secs")]
    pub display_interval: Duration,

    /// Minimum spacing between recorded pointer moves
    #[serde(with = "duration_secs")]
    pub mouse_move_throttle: Duration,

    /// How long to wait for each producer on shutdown
    #[serde(with = "duration_secs")]
    pub shutdown_timeout: Duration,

    /// Which input sources to capture
    pub sources: SourceConfig,

    /// Foreground application probe tuning
    pub probe: ProbeSettings,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            observation_interval: Duration::from_secs(2),
            activity_window: 10,
            max_events_memory: 1000,
            max_session_states: 500,
            data_file: DEFAULT_DATA_FILE.to_string(),
            data_dir: default_data_dir(),
            auto_save_interval: 30,
            display_interval: Duration::from_secs(2),
            mouse_move_throttle: Duration::from_millis(250),
            shutdown_timeout: Duration::from_secs(2),
            sources: SourceConfig::default(),
            probe: ProbeSettings::default(),
        }
    }
}

impl ObserverSettings {
    /// Load settings from the default location, falling back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save settings to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Get the path to the default configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join("config.json")
    }

    /// Validate into an immutable [`ObserverConfig`].
    pub fn validate(self) -> Result<ObserverConfig, ConfigError> {
        ObserverConfig::try_from(self)
    }
}

/// Default directory for the session file.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Validated, immutable observer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ObserverSettings", into = "ObserverSettings")]
pub struct ObserverConfig {
    settings: ObserverSettings,
}

impl ObserverConfig {
    pub fn observation_interval(&self) -> Duration {
        self.settings.observation_interval
    }

    pub fn activity_window(&self) -> u64 {
        self.settings.activity_window
    }

    pub fn max_events_memory(&self) -> usize {
        self.settings.max_events_memory
    }

    pub fn max_session_states(&self) -> usize {
        self.settings.max_session_states
    }

    pub fn data_file(&self) -> &str {
        &self.settings.data_file
    }

    pub fn data_dir(&self) -> &Path {
        &self.settings.data_dir
    }

    /// Full path of the session file.
    pub fn data_path(&self) -> PathBuf {
        self.settings.data_dir.join(&self.settings.data_file)
    }

    pub fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.settings.auto_save_interval)
    }

    pub fn display_interval(&self) -> Duration {
        self.settings.display_interval
    }

    pub fn mouse_move_throttle(&self) -> Duration {
        self.settings.mouse_move_throttle
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.settings.shutdown_timeout
    }

    pub fn sources(&self) -> &SourceConfig {
        &self.settings.sources
    }

    pub fn probe(&self) -> &ProbeSettings {
        &self.settings.probe
    }

    /// The raw settings this config was validated from.
    pub fn settings(&self) -> &ObserverSettings {
        &self.settings
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            settings: ObserverSettings::default(),
        }
    }
}

impl TryFrom<ObserverSettings> for ObserverConfig {
    type Error = ConfigError;

    fn try_from(settings: ObserverSettings) -> Result<Self, Self::Error> {
        if settings.observation_interval.is_zero() {
            return Err(ConfigError::invalid("observation_interval", "must be > 0"));
        }
        if settings.display_interval.is_zero() {
            return Err(ConfigError::invalid("display_interval", "must be > 0"));
        }
        if settings.shutdown_timeout.is_zero() {
            return Err(ConfigError::invalid("shutdown_timeout", "must be > 0"));
        }

        check_range(
            "max_events_memory",
            settings.max_events_memory,
            MAX_EVENTS_MEMORY_RANGE,
        )?;
        check_range(
            "max_session_states",
            settings.max_session_states,
            MAX_SESSION_STATES_RANGE,
        )?;
        check_range(
            "activity_window",
            settings.activity_window,
            ACTIVITY_WINDOW_RANGE,
        )?;
        check_range(
            "auto_save_interval",
            settings.auto_save_interval,
            AUTO_SAVE_INTERVAL_RANGE,
        )?;

        check_file_name(&settings.data_file)?;
        settings.probe.check()?;

        Ok(Self { settings })
    }
}

impl From<ObserverConfig> for ObserverSettings {
    fn from(config: ObserverConfig) -> Self {
        config.settings
    }
}

fn check_range<T>(field: &'static str, value: T, (min, max): (T, T)) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(ConfigError::invalid(
            field,
            format!("must be between {min} and {max}, got {value}"),
        ));
    }
    Ok(())
}

/// Reject anything that is not a plain file name.
fn check_file_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::UnsafePath(
            "data_file must not be empty".to_string(),
        ));
    }
    if name.contains("..") {
        return Err(ConfigError::UnsafePath(format!(
            "data_file {name:?} contains a parent-directory reference"
        )));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(ConfigError::UnsafePath(format!(
            "data_file {name:?} must be a simple file name without directories"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ConfigError::UnsafePath(format!(
            "data_file {name:?} must be a relative file name"
        ))),
    }
}

/// Configuration for which input sources to capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub keyboard: bool,
    pub mouse: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            keyboard: true,
            mouse: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();

        Self {
            keyboard: sources.iter().any(|s| s == "keyboard" || s == "all"),
            mouse: sources.iter().any(|s| s == "mouse" || s == "all"),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.keyboard || self.mouse
    }
}

/// Tuning for the foreground application probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Minimum age of the cached context before it is refreshed
    #[serde(with = "duration_secs")]
    pub cache_duration: Duration,

    /// Sleep between probe attempts
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Upper bound for the foreground-application command
    #[serde(with = "duration_secs")]
    pub command_timeout: Duration,

    /// Failures in a row before the probe backs off
    pub max_consecutive_errors: u32,

    /// Backoff after too many consecutive failures
    #[serde(with = "duration_secs")]
    pub error_backoff: Duration,

    /// Pause after an unexpected error in the probe loop
    #[serde(with = "duration_secs")]
    pub unexpected_error_pause: Duration,

    /// Maximum number of running process names kept
    pub max_running: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            cache_duration: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            command_timeout: Duration::from_secs(5),
            max_consecutive_errors: 10,
            error_backoff: Duration::from_secs(30),
            unexpected_error_pause: Duration::from_secs(5),
            max_running: 15,
        }
    }
}

impl ProbeSettings {
    fn check(&self) -> Result<(), ConfigError> {
        if self.poll_interval < Duration::from_secs(1) {
            return Err(ConfigError::invalid("probe.poll_interval", "must be >= 1s"));
        }
        if self.command_timeout.is_zero() {
            return Err(ConfigError::invalid("probe.command_timeout", "must be > 0"));
        }
        if self.max_consecutive_errors == 0 {
            return Err(ConfigError::invalid(
                "probe.max_consecutive_errors",
                "must be >= 1",
            ));
        }
        let (min, max) = MAX_RUNNING_RANGE;
        if !(min..=max).contains(&self.max_running) {
            return Err(ConfigError::invalid(
                "probe.max_running",
                format!("must be between {min} and {max}"),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Invalid { field: &'static str, reason: String },
    UnsafePath(String),
    Io(String),
    Parse(String),
    Serialize(String),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { field, reason } => write!(f, "Invalid {field}: {reason}"),
            ConfigError::UnsafePath(e) => write!(f, "Unsafe path: {e}"),
            ConfigError::Io(e) => write!(f, "IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "Parse error: {e}"),
            ConfigError::Serialize(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as fractional seconds.
mod duration_secs {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
