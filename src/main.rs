//! Luxor Observer CLI
//!
//! Local activity observer with a crash-safe session file.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use luxor_observer::{
    collector::check_permission,
    config::{ObserverConfig, ObserverSettings, SourceConfig},
    session::SessionStore,
    Observer, PRIVACY_DECLARATION, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "luxor-observer")]
#[command(version = VERSION)]
#[command(about = "Local activity observer", long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start observing until Ctrl+C
    Start {
        /// Input sources to capture (keyboard, mouse, or all)
        #[arg(long, default_value = "all")]
        sources: String,

        /// Directory for the session file
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Show the saved session
    Status {
        /// Directory for the session file
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config,

    /// Display what is and is not captured
    Privacy,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Start { sources, data_dir } => {
            cmd_start(cli.config.as_deref(), &sources, data_dir)
        }
        Commands::Status { data_dir } => cmd_status(cli.config.as_deref(), data_dir),
        Commands::Config => cmd_config(cli.config.as_deref()),
        Commands::Privacy => {
            println!("{PRIVACY_DECLARATION}");
            Ok(())
        }
    };

    if let Err(e) = result {
        error!(error = %e, "fatal error");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load settings, apply CLI overrides, and validate.
fn load_config(
    config_path: Option<&Path>,
    sources: Option<SourceConfig>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<ObserverConfig> {
    let mut settings = match config_path {
        Some(path) => ObserverSettings::load_from(path),
        None => ObserverSettings::load(),
    }
    .context("could not load configuration")?;

    if let Some(sources) = sources {
        settings.sources = sources;
    }
    if let Some(data_dir) = data_dir {
        settings.data_dir = data_dir;
    }

    settings.validate().context("invalid configuration")
}

fn cmd_start(
    config_path: Option<&Path>,
    sources: &str,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("Luxor Observer v{VERSION}");
    println!();

    let source_config = SourceConfig::from_csv(sources);
    if !source_config.any_enabled() {
        bail!("at least one source must be enabled (keyboard or mouse)");
    }

    if !check_permission() {
        eprintln!("Input Monitoring permission not granted.");
        eprintln!();
        eprintln!("To grant permission:");
        eprintln!("1. Open System Settings > Privacy & Security");
        eprintln!("2. Select 'Input Monitoring'");
        eprintln!("3. Add this application to the allowed list");
        eprintln!("4. Restart the application");
        bail!("input monitoring permission not granted");
    }

    let config = load_config(config_path, Some(source_config), data_dir)?;

    println!("Starting observation...");
    println!(
        "  Keyboard: {}",
        if config.sources().keyboard {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  Mouse: {}",
        if config.sources().mouse {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Activity window: {}s", config.activity_window());
    println!("  Auto-save every: {}s", config.auto_save_interval().as_secs());
    println!("  Session file: {}", config.data_path().display());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .context("could not set Ctrl+C handler")?;
    }

    let observer = Observer::new(config);
    observer.run(&shutdown).context("observer failed")?;

    println!();
    println!("{}", observer.summary());
    Ok(())
}

fn cmd_status(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path, None, data_dir)?;
    let path = config.data_path();

    println!("Luxor Observer Status");
    println!("=====================");
    println!();
    println!("Session file: {}", path.display());

    if !path.exists() {
        println!("Health: degraded (no session file yet)");
        return Ok(());
    }

    let session = SessionStore::load(&path)
        .with_context(|| format!("session file {} is unreadable", path.display()))?;

    println!("Health: healthy");
    println!();
    println!("Session started: {}", session.session_start.to_rfc3339());
    println!("States recorded: {}", session.total_states);
    println!("Keyboard events: {}", session.keyboard_events);
    println!("Mouse events: {}", session.mouse_events);
    println!();

    match session.states.last() {
        Some(state) => {
            println!("Latest state ({}):", state.timestamp.to_rfc3339());
            println!("  Level: {}", state.consciousness_level.label());
            println!("  Workflow: {}", state.workflow_context);
            println!("  Keyboard: {:.3} events/s", state.keyboard_activity);
            println!("  Mouse: {:.3} events/s", state.mouse_activity);
            if !state.active_apps.is_empty() {
                println!("  Apps: {}", state.active_apps.join(", "));
            }
        }
        None => println!("No states recorded yet"),
    }

    Ok(())
}

fn cmd_config(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path, None, None)?;

    println!("Configuration");
    println!("=============");
    println!();
    println!(
        "Config file: {}",
        config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(ObserverSettings::config_path)
            .display()
    );
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("could not render configuration")?
    );
    Ok(())
}
