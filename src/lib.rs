//! Luxor Observer - local activity observer.
//!
//! This library watches keyboard and pointer timing plus the foreground
//! application, reduces them into periodic classified snapshots, and keeps a
//! bounded, crash-safe session history on disk.
//!
//! # What is captured
//!
//! - **Timing only**: key presses carry no key codes, pointer events carry
//!   no coordinates
//! - **Bounded memory**: raw events live in fixed-size rings per source
//! - **Atomic persistence**: the session file is always absent or complete
//! - **App names, not titles**: the foreground application is reported by
//!   process name; window titles are never read
//!
//! # Platforms
//!
//! Keyboard and pointer capture uses a CGEventTap on macOS and low-level
//! hooks on Windows. Other targets, Linux included, get a null capture
//! backend: the listeners idle and every rate stays at 0, while the app
//! context probe still runs (`xdotool` plus the process table on Linux).
//!
//! # Architecture
//!
//! ```text
//!  keyboard listener ──▶ EventBuffer ──┐
//!                                      │
//!  pointer listener  ──▶ EventBuffer ──┼──▶ ActivityAnalyzer ──▶ SessionStore ──▶ session file
//!                                      │        (per tick)        (history)      (atomic write)
//!  app context probe ──▶ ContextCache ─┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use luxor_observer::{config::ObserverSettings, Observer};
//!
//! let config = ObserverSettings::default().validate().unwrap();
//! let observer = Observer::new(config);
//!
//! observer.start().unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(10));
//! println!("{:?}", observer.current_state());
//! observer.stop();
//! ```

pub mod clock;
pub mod collector;
pub mod config;
pub mod context;
pub mod core;
pub mod observer;
pub mod session;
pub mod signal;

// Re-export key types at crate root for convenience
pub use collector::{CaptureMode, CollectorError, EventBuffer, EventRecord, InputSource};
pub use config::{ConfigError, ObserverConfig, ObserverSettings, SourceConfig};
pub use context::{AppContext, NullProbe, OsProbe, ProbeError, SystemProbe};
pub use self::core::{ActivityAnalyzer, ConsciousnessLevel, QuantumState, WorkflowContext};
pub use observer::{LifecycleError, Observer, ObserverState};
pub use session::{EventTotals, PersistError, SessionFile, SessionStore};
pub use signal::RunSignal;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capture declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║            LUXOR OBSERVER - CAPTURE DECLARATION                  ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This observer classifies your activity on this machine.         ║
║                                                                  ║
║  ✓ WHAT WE CAPTURE:                                              ║
║    • When keys are pressed and released (timing only)            ║
║    • When the pointer moves or clicks (timing and button only)   ║
║    • The name of the foreground application                      ║
║    • Names of running processes                                  ║
║                                                                  ║
║  ✗ WHAT WE NEVER CAPTURE:                                        ║
║    • Which keys you press (no passwords, messages, etc.)         ║
║    • Where your cursor is (no screen position tracking)          ║
║    • Any screen or window content                                ║
║                                                                  ║
║  Everything stays on this machine. Raw events are held in a      ║
║  fixed-size memory ring; only classified snapshots are saved.    ║
║                                                                  ║
║  You can inspect the saved session anytime with:                 ║
║    luxor-observer status                                         ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
