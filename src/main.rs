//! editor-pulse CLI
//!
//! Runs as an editor sidecar: host events come in on stdin as JSON lines,
//! renderer messages go out on stdout as JSON lines. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use editor_pulse::{
    config::Config,
    host::{EventSource, DEFAULT_SOURCE_CAPACITY},
    relay::relay,
    session::Session,
    VERSION,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "editor-pulse")]
#[command(version = VERSION)]
#[command(about = "Turns live editor activity into decaying metrics for a visualizer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session over a stream of host events
    Run {
        /// Read host events from this file instead of stdin
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Decay tick interval in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Number of visual presets
        #[arg(long)]
        presets: Option<usize>,
    },

    /// Show configuration
    Config,

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            tick_ms,
            presets,
        } => cmd_run(input, tick_ms, presets),
        Commands::Config => cmd_config(),
        Commands::InitConfig { force } => cmd_init_config(force),
    }
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn cmd_run(input: Option<PathBuf>, tick_ms: Option<u64>, presets: Option<usize>) -> Result<()> {
    let mut config = Config::load().context("loading configuration")?;
    if let Some(ms) = tick_ms {
        config.tick_interval = Duration::from_millis(ms);
    }
    if let Some(count) = presets {
        config.preset_count = count;
    }
    config.validate().context("invalid configuration")?;

    init_logging(&config.log_filter);

    let reader: Box<dyn BufRead + Send> = match &input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut session = Session::open(&config).context("opening session")?;

    let mut source = EventSource::new(DEFAULT_SOURCE_CAPACITY);
    source.start(reader).context("starting host event reader")?;

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let report = relay(&mut session, &mut source, &mut io::stdout(), &running)
        .context("relaying host events")?;

    if source.rejected_lines() > 0 {
        tracing::warn!(lines = source.rejected_lines(), "malformed host events skipped");
    }
    tracing::debug!(
        events = report.events_forwarded,
        messages = report.messages_written,
        output_closed = report.output_closed,
        "relay finished"
    );
    eprintln!();
    eprintln!("Session {}", session.id());
    eprintln!("{}", session.stats().summary());
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load().context("loading configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_init_config(force: bool) -> Result<()> {
    let path = Config::config_path();
    if path.exists() && !force {
        println!("Config already exists at {path:?} (use --force to overwrite)");
        return Ok(());
    }

    Config::default().save().context("saving configuration")?;
    println!("Wrote default configuration to {path:?}");
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
