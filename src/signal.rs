//! Cooperative cancellation shared by every producer thread.
//!
//! The running flag is the only thing loops check. The wake channel exists so
//! a thread parked in [`RunSignal::sleep`] notices a stop immediately instead
//! of finishing its full interval.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug)]
pub struct RunSignal {
    running: AtomicBool,
    // Dropping the sender disconnects every receiver, which wakes sleepers.
    wake_tx: Mutex<Option<Sender<()>>>,
    wake_rx: Receiver<()>,
}

impl RunSignal {
    /// Create a signal in the running state.
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(0);
        Self {
            running: AtomicBool::new(true),
            wake_tx: Mutex::new(Some(wake_tx)),
            wake_rx,
        }
    }

    /// Create a shared signal in the running state.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the running flag and wake any sleeping thread.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Sleep for `duration` or until [`stop`](Self::stop) is called.
    ///
    /// Returns whether the signal is still running afterwards.
    pub fn sleep(&self, duration: Duration) -> bool {
        if !self.is_running() {
            return false;
        }
        match self.wake_rx.recv_timeout(duration) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => self.is_running(),
            Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

impl Default for RunSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_sleep_runs_full_interval_while_running() {
        let signal = RunSignal::new();
        let started = Instant::now();
        assert!(signal.sleep(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_stop_wakes_sleeper() {
        let signal = RunSignal::shared();
        let sleeper = {
            let signal = signal.clone();
            std::thread::spawn(move || {
                let started = Instant::now();
                let still_running = signal.sleep(Duration::from_secs(30));
                (still_running, started.elapsed())
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        signal.stop();

        let (still_running, elapsed) = sleeper.join().unwrap();
        assert!(!still_running);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let signal = RunSignal::new();
        signal.stop();
        signal.stop();
        assert!(!signal.is_running());
        assert!(!signal.sleep(Duration::from_secs(10)));
    }
}
