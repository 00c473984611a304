//! Periodic foreground-application probing.
//!
//! [`AppContextProbe`] owns the OS probe and is the only writer of the shared
//! [`ContextCache`]. Failures never escape a refresh: the previous foreground
//! name is kept, log output is thinned out, and a run of failures triggers a
//! long backoff.

use crate::config::ProbeSettings;
use crate::context::probe::{ProbeError, SystemProbe};
use crate::context::types::{AppContext, SharedContextCache};
use crate::signal::RunSignal;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, error, warn};

/// Consecutive timeouts reported at warn level before going quiet.
const LOUD_TIMEOUTS: u32 = 3;

/// What a call to [`AppContextProbe::refresh`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cache was replaced with a new context
    Refreshed,
    /// The cached context is still fresh; nothing was queried
    Cached,
    /// The cache was replaced, and too many failures in a row call for a backoff
    Backoff,
}

pub struct AppContextProbe {
    probe: Box<dyn SystemProbe>,
    cache: SharedContextCache,
    settings: ProbeSettings,
    last_refresh: Option<Instant>,
    consecutive_errors: u32,
}

impl AppContextProbe {
    pub fn new(probe: Box<dyn SystemProbe>, cache: SharedContextCache, settings: ProbeSettings) -> Self {
        Self {
            probe,
            cache,
            settings,
            last_refresh: None,
            consecutive_errors: 0,
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Query the OS and replace the cached context, unless it is still fresh.
    pub fn refresh(&mut self) -> RefreshOutcome {
        if let Some(last) = self.last_refresh {
            if last.elapsed() < self.settings.cache_duration {
                return RefreshOutcome::Cached;
            }
        }

        let previous = self.cache.latest();

        let active = match self.probe.foreground_application() {
            Ok(name) => {
                self.consecutive_errors = 0;
                name
            }
            Err(e) => {
                self.consecutive_errors += 1;
                self.report_foreground_error(&e);
                previous.active.clone()
            }
        };

        let running = match self.probe.running_processes() {
            Ok(mut names) => {
                names.truncate(self.settings.max_running);
                names
            }
            Err(e) => {
                debug!(error = %e, "process enumeration failed");
                Vec::new()
            }
        };

        self.cache.replace(AppContext::new(active, running));
        self.last_refresh = Some(Instant::now());

        if self.consecutive_errors >= self.settings.max_consecutive_errors {
            self.consecutive_errors = 0;
            RefreshOutcome::Backoff
        } else {
            RefreshOutcome::Refreshed
        }
    }

    fn report_foreground_error(&self, e: &ProbeError) {
        match e {
            ProbeError::Timeout(_) if self.consecutive_errors <= LOUD_TIMEOUTS => {
                warn!(error = %e, "foreground application query timed out");
            }
            ProbeError::Unavailable(_) if self.consecutive_errors == 1 => {
                error!(error = %e, "foreground application probe unavailable");
            }
            _ => debug!(
                error = %e,
                consecutive = self.consecutive_errors,
                "foreground application query failed"
            ),
        }
    }

    /// Probe until the signal stops.
    pub fn run(mut self, signal: &RunSignal) {
        debug!("app context probe started");

        while signal.is_running() {
            // A panicking probe costs one iteration, not the loop
            match panic::catch_unwind(AssertUnwindSafe(|| self.refresh())) {
                Ok(RefreshOutcome::Backoff) => {
                    error!(
                        backoff_secs = self.settings.error_backoff.as_secs_f64(),
                        "too many app probe errors, backing off"
                    );
                    if !signal.sleep(self.settings.error_backoff) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => {
                    error!("unexpected error in app probe loop");
                    if !signal.sleep(self.settings.unexpected_error_pause) {
                        break;
                    }
                }
            }
            signal.sleep(self.settings.poll_interval);
        }

        debug!("app context probe stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::types::ContextCache;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Scripted probe: answers from a list, then repeats the last answer.
    struct ScriptedProbe {
        foreground: Vec<Result<String, ProbeError>>,
        processes: Result<Vec<String>, ProbeError>,
        calls: Arc<AtomicU32>,
    }

    impl SystemProbe for ScriptedProbe {
        fn foreground_application(&self) -> Result<String, ProbeError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let index = call.min(self.foreground.len() - 1);
            self.foreground[index].clone()
        }

        fn running_processes(&self) -> Result<Vec<String>, ProbeError> {
            self.processes.clone()
        }
    }

    fn uncached() -> ProbeSettings {
        ProbeSettings {
            cache_duration: Duration::ZERO,
            max_consecutive_errors: 3,
            ..ProbeSettings::default()
        }
    }

    fn monitor(
        foreground: Vec<Result<String, ProbeError>>,
        processes: Result<Vec<String>, ProbeError>,
        settings: ProbeSettings,
    ) -> (AppContextProbe, SharedContextCache, Arc<AtomicU32>) {
        let cache = ContextCache::shared();
        let calls = Arc::new(AtomicU32::new(0));
        let probe = ScriptedProbe {
            foreground,
            processes,
            calls: calls.clone(),
        };
        (
            AppContextProbe::new(Box::new(probe), cache.clone(), settings),
            cache,
            calls,
        )
    }

    #[test]
    fn test_refresh_replaces_context() {
        let (mut monitor, cache, _) = monitor(
            vec![Ok("Visual Studio Code".into())],
            Ok(vec!["launchd".into(), "Code".into()]),
            uncached(),
        );

        assert_eq!(monitor.refresh(), RefreshOutcome::Refreshed);
        let context = cache.latest();
        assert_eq!(context.active, "Visual Studio Code");
        assert_eq!(context.running, vec!["launchd", "Code"]);
    }

    #[test]
    fn test_refresh_is_rate_limited() {
        let (mut monitor, _, calls) = monitor(
            vec![Ok("Safari".into())],
            Ok(Vec::new()),
            ProbeSettings {
                cache_duration: Duration::from_secs(60),
                ..ProbeSettings::default()
            },
        );

        assert_eq!(monitor.refresh(), RefreshOutcome::Refreshed);
        assert_eq!(monitor.refresh(), RefreshOutcome::Cached);
        assert_eq!(monitor.refresh(), RefreshOutcome::Cached);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_foreground_failure_keeps_previous_name() {
        let (mut monitor, cache, _) = monitor(
            vec![
                Ok("Figma".into()),
                Err(ProbeError::Timeout(Duration::from_secs(5))),
            ],
            Ok(vec!["figma_agent".into()]),
            uncached(),
        );

        monitor.refresh();
        monitor.refresh();

        let context = cache.latest();
        assert_eq!(context.active, "Figma");
        assert_eq!(monitor.consecutive_errors(), 1);
    }

    #[test]
    fn test_process_failure_empties_running() {
        let (mut monitor, cache, _) = monitor(
            vec![Ok("Spotify".into())],
            Err(ProbeError::Unsupported),
            uncached(),
        );
        cache.replace(AppContext::new("old", vec!["stale".into()]));

        monitor.refresh();

        let context = cache.latest();
        assert_eq!(context.active, "Spotify");
        assert!(context.running.is_empty());
    }

    #[test]
    fn test_running_list_truncated() {
        let names: Vec<String> = (0..40).map(|i| format!("proc{i}")).collect();
        let (mut monitor, cache, _) = monitor(vec![Ok(String::new())], Ok(names), uncached());

        monitor.refresh();
        assert_eq!(cache.latest().running.len(), 15);
        assert_eq!(cache.latest().running[0], "proc0");
    }

    #[test]
    fn test_backoff_after_consecutive_errors() {
        let (mut monitor, _, _) = monitor(
            vec![Err(ProbeError::Unavailable("osascript missing".into()))],
            Ok(Vec::new()),
            uncached(),
        );

        assert_eq!(monitor.refresh(), RefreshOutcome::Refreshed);
        assert_eq!(monitor.refresh(), RefreshOutcome::Refreshed);
        assert_eq!(monitor.refresh(), RefreshOutcome::Backoff);
        assert_eq!(monitor.consecutive_errors(), 0);
    }

    #[test]
    fn test_success_resets_error_count() {
        let (mut monitor, _, _) = monitor(
            vec![
                Err(ProbeError::CommandFailed("exit 1".into())),
                Err(ProbeError::CommandFailed("exit 1".into())),
                Ok("Terminal".into()),
                Err(ProbeError::CommandFailed("exit 1".into())),
            ],
            Ok(Vec::new()),
            uncached(),
        );

        for _ in 0..4 {
            assert_eq!(monitor.refresh(), RefreshOutcome::Refreshed);
        }
        assert_eq!(monitor.consecutive_errors(), 1);
    }

    struct PanickingProbe;

    impl SystemProbe for PanickingProbe {
        fn foreground_application(&self) -> Result<String, ProbeError> {
            panic!("probe blew up");
        }

        fn running_processes(&self) -> Result<Vec<String>, ProbeError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_run_survives_panicking_probe() {
        let monitor = AppContextProbe::new(
            Box::new(PanickingProbe),
            ContextCache::shared(),
            ProbeSettings {
                unexpected_error_pause: Duration::from_millis(10),
                ..uncached()
            },
        );
        let signal = RunSignal::shared();

        let handle = {
            let signal = signal.clone();
            std::thread::spawn(move || monitor.run(&signal))
        };

        std::thread::sleep(Duration::from_millis(50));
        signal.stop();
        assert!(handle.join().is_ok());
    }

    #[test]
    fn test_run_exits_on_stop() {
        let (monitor, cache, _) = monitor(vec![Ok("iTerm2".into())], Ok(Vec::new()), uncached());
        let signal = RunSignal::shared();

        let handle = {
            let signal = signal.clone();
            std::thread::spawn(move || monitor.run(&signal))
        };

        std::thread::sleep(Duration::from_millis(50));
        signal.stop();
        handle.join().unwrap();
        assert_eq!(cache.latest().active, "iTerm2");
    }
}
