//! OS probe capability for foreground application and running processes.
//!
//! The refresh loop only talks to [`SystemProbe`]. [`OsProbe`] queries the
//! real system; [`NullProbe`] stands in wherever that is not possible.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::process::Command;
use tokio::runtime::Runtime;
use tracing::warn;

/// Capability interface to the operating system.
pub trait SystemProbe: Send + Sync {
    /// Name of the foreground application. Bounded latency, may fail.
    fn foreground_application(&self) -> Result<String, ProbeError>;

    /// Names of running processes. May fail.
    fn running_processes(&self) -> Result<Vec<String>, ProbeError>;
}

/// Probe that reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProbe;

impl SystemProbe for NullProbe {
    fn foreground_application(&self) -> Result<String, ProbeError> {
        Ok(String::new())
    }

    fn running_processes(&self) -> Result<Vec<String>, ProbeError> {
        Ok(Vec::new())
    }
}

/// Foreground-application command for the current platform.
///
/// On Linux the command prints the owning pid of the active window rather
/// than its title, which can carry document or page content.
fn foreground_command() -> Option<(&'static str, Vec<&'static str>)> {
    #[cfg(target_os = "macos")]
    {
        Some((
            "osascript",
            vec![
                "-e",
                "tell application \"System Events\"\n\
                 \tset frontApp to name of first application process whose frontmost is true\n\
                 \treturn frontApp\n\
                 end tell",
            ],
        ))
    }

    #[cfg(target_os = "linux")]
    {
        Some(("xdotool", vec!["getactivewindow", "getwindowpid"]))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Probe backed by a platform command and `sysinfo`.
pub struct OsProbe {
    runtime: Runtime,
    command_timeout: Duration,
    system: Mutex<System>,
}

impl OsProbe {
    pub fn new(command_timeout: Duration) -> Result<Self, ProbeError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ProbeError::Unavailable(format!("probe runtime: {e}")))?;

        Ok(Self {
            runtime,
            command_timeout,
            system: Mutex::new(System::new()),
        })
    }

    /// Run `program` and return its trimmed stdout, killing it on timeout.
    fn run_command(&self, program: &str, args: &[&str]) -> Result<String, ProbeError> {
        let timeout = self.command_timeout;

        self.runtime.block_on(async {
            let output = Command::new(program)
                .args(args)
                .kill_on_drop(true)
                .output();

            match tokio::time::timeout(timeout, output).await {
                Err(_) => Err(ProbeError::Timeout(timeout)),
                Ok(Err(e)) => Err(ProbeError::Unavailable(format!("{program}: {e}"))),
                Ok(Ok(output)) if output.status.success() => {
                    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
                }
                Ok(Ok(output)) => Err(ProbeError::CommandFailed(format!(
                    "{program} exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ))),
            }
        })
    }

    /// Name of the process with the pid printed by the window tool.
    fn process_name(&self, pid: &str) -> Result<String, ProbeError> {
        let pid = pid
            .parse::<u32>()
            .map(Pid::from_u32)
            .map_err(|_| ProbeError::CommandFailed(format!("not a pid: {pid:?}")))?;

        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            ProcessRefreshKind::new(),
        );

        system
            .process(pid)
            .map(|process| process.name().to_string_lossy().to_string())
            .ok_or_else(|| ProbeError::CommandFailed(format!("no process with pid {pid}")))
    }
}

impl SystemProbe for OsProbe {
    fn foreground_application(&self) -> Result<String, ProbeError> {
        let Some((program, args)) = foreground_command() else {
            return Ok(String::new());
        };
        let output = self.run_command(program, &args)?;

        if cfg!(target_os = "linux") {
            self.process_name(&output)
        } else {
            Ok(output)
        }
    }

    fn running_processes(&self) -> Result<Vec<String>, ProbeError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ProbeError::Unsupported);
        }

        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        // Names come with every refresh; skip cpu/memory/disk sampling
        system.refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::new());

        let mut processes: Vec<_> = system
            .processes()
            .iter()
            .map(|(pid, process)| (pid.as_u32(), process.name().to_string_lossy().to_string()))
            .filter(|(_, name)| !name.is_empty())
            .collect();
        processes.sort_by_key(|(pid, _)| *pid);

        Ok(processes.into_iter().map(|(_, name)| name).collect())
    }
}

/// Select the OS probe, or the null probe if it cannot be built.
pub fn default_probe(command_timeout: Duration) -> Box<dyn SystemProbe> {
    match OsProbe::new(command_timeout) {
        Ok(probe) => Box::new(probe),
        Err(e) => {
            warn!(error = %e, "OS probe unavailable, falling back to null probe");
            Box::new(NullProbe)
        }
    }
}

/// Errors from OS probe calls.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeError {
    Timeout(Duration),
    Unavailable(String),
    CommandFailed(String),
    Unsupported,
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::Timeout(d) => write!(f, "Probe timed out after {:.1}s", d.as_secs_f64()),
            ProbeError::Unavailable(e) => write!(f, "Probe unavailable: {e}"),
            ProbeError::CommandFailed(e) => write!(f, "Probe command failed: {e}"),
            ProbeError::Unsupported => write!(f, "Probe not supported on this platform"),
        }
    }
}

impl std::error::Error for ProbeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_probe_reports_nothing() {
        let probe = NullProbe;
        assert_eq!(probe.foreground_application().unwrap(), "");
        assert!(probe.running_processes().unwrap().is_empty());
    }

    #[test]
    fn test_missing_command_is_unavailable() {
        let probe = OsProbe::new(Duration::from_secs(5)).unwrap();
        let err = probe
            .run_command("luxor-definitely-not-a-command", &[])
            .unwrap_err();
        assert!(matches!(err, ProbeError::Unavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_output_is_trimmed() {
        let probe = OsProbe::new(Duration::from_secs(5)).unwrap();
        assert_eq!(probe.run_command("echo", &["  Terminal  "]).unwrap(), "Terminal");
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_command_times_out() {
        let probe = OsProbe::new(Duration::from_millis(100)).unwrap();
        let err = probe.run_command("sleep", &["5"]).unwrap_err();
        assert_eq!(err, ProbeError::Timeout(Duration::from_millis(100)));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_reported() {
        let probe = OsProbe::new(Duration::from_secs(5)).unwrap();
        let err = probe.run_command("false", &[]).unwrap_err();
        assert!(matches!(err, ProbeError::CommandFailed(_)));
    }

    #[test]
    fn test_process_name_resolves_own_pid() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        let probe = OsProbe::new(Duration::from_secs(5)).unwrap();
        let name = probe.process_name(&std::process::id().to_string()).unwrap();
        assert!(!name.is_empty());
    }

    #[test]
    fn test_process_name_rejects_window_title() {
        let probe = OsProbe::new(Duration::from_secs(5)).unwrap();
        let err = probe.process_name("secret.txt - Editor").unwrap_err();
        assert!(matches!(err, ProbeError::CommandFailed(_)));
    }

    #[test]
    fn test_running_processes_sees_something() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        let probe = OsProbe::new(Duration::from_secs(5)).unwrap();
        assert!(!probe.running_processes().unwrap().is_empty());
    }
}
