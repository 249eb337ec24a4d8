use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use tracing_subscriber::EnvFilter;

use file_source_rs::output;
use file_source_rs::prelude::*;

#[derive(Parser)]
#[command(name = "file_source_rs")]
#[command(about = "Polls a directory and emits every new file exactly once", long_about = None)]
struct Cli {
    /// Directory to poll (overrides `directory` from the config file)
    directory: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only emit files whose name matches this glob (e.g. "*.txt")
    #[arg(short = 'p', long)]
    filename_pattern: Option<String>,

    /// How files become messages
    #[arg(short, long, value_enum)]
    mode: Option<ReadingMode>,

    /// Surround line messages with start/end markers
    #[arg(long)]
    with_markers: bool,

    /// How emitted files are identified in the metadata store
    #[arg(long, value_enum)]
    identifier: Option<IdentifierKind>,

    /// Emit a file again when its modification time changes
    #[arg(long)]
    reaccept_modified: bool,

    /// Delay between polls, in --time-unit
    #[arg(long)]
    fixed_delay: Option<u64>,

    /// Delay before the first poll, in --time-unit
    #[arg(long)]
    initial_delay: Option<u64>,

    /// Unit of the trigger delays
    #[arg(long, value_enum)]
    time_unit: Option<TimeUnit>,

    /// Maximum files emitted per poll (-1 for unlimited)
    #[arg(long, allow_negative_numbers = true)]
    max_messages: Option<i64>,

    /// Metadata store location: memory: or file:<path>
    #[arg(long)]
    metadata_url: Option<String>,

    /// Append messages to this JSON Lines file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run a single poll and exit
    #[arg(long)]
    once: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// CLI flags win over every other configuration layer
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(directory) = &self.directory {
            settings.directory = Some(directory.clone());
        }
        if let Some(pattern) = &self.filename_pattern {
            settings.filename_pattern = Some(pattern.clone());
        }
        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if self.with_markers {
            settings.with_markers = true;
        }
        if let Some(identifier) = self.identifier {
            settings.identifier = identifier;
        }
        if self.reaccept_modified {
            settings.reaccept_modified = true;
        }
        if let Some(delay) = self.fixed_delay {
            settings.trigger.fixed_delay = delay;
        }
        if let Some(delay) = self.initial_delay {
            settings.trigger.initial_delay = delay;
        }
        if let Some(unit) = self.time_unit {
            settings.trigger.time_unit = unit;
        }
        if let Some(max) = self.max_messages {
            settings.trigger.max_messages = max;
        }
        if let Some(url) = &self.metadata_url {
            settings.metadata.url = url.clone();
        }
        if let Some(path) = &self.output {
            settings.output = Some(path.clone());
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    if let Some(path) = &cli.config {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
    }

    let mut settings = Settings::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("Failed to load configuration")?;
    cli.apply_to(&mut settings);

    let channel = output::open(settings.output.as_deref()).context("Failed to open output")?;
    let source =
        FileSource::from_settings(&settings, channel).context("Failed to initialize file source")?;

    if cli.once {
        let report = source.poll_once().context("Poll failed")?;
        eprintln!();
        eprintln!("Poll completed:");
        eprintln!("  Files scanned:    {}", report.files_scanned);
        eprintln!("  Files filtered:   {}", report.files_filtered);
        eprintln!("  Files emitted:    {}", report.files_emitted);
        eprintln!("  Messages emitted: {}", report.messages_emitted);
        for error in &report.file_errors {
            eprintln!("  Error: {}: {}", error.path.display(), error.message);
        }
        for error in &report.scan_errors {
            eprintln!("  Skipped: {}", error);
        }
        return Ok(());
    }

    // Set up graceful shutdown handler
    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        eprintln!("\nShutdown requested. Finishing current poll...");
        let _ = shutdown_tx.send(());
    })
    .context("Error setting Ctrl-C handler")?;

    let running = source.start().context("Failed to start poll thread")?;
    let _ = shutdown_rx.recv();
    let stats = running.stop();

    eprintln!("==================================================");
    eprintln!("FILE SOURCE STOPPED");
    eprintln!("==================================================");
    eprintln!("Polls:            {}", stats.polls);
    eprintln!("  Skipped:        {}", stats.polls_skipped);
    eprintln!("  Failed:         {}", stats.polls_failed);
    eprintln!("Files emitted:    {}", stats.files_emitted);
    eprintln!("Messages emitted: {}", stats.messages_emitted);
    eprintln!("File errors:      {}", stats.file_errors);
    eprintln!("Scan errors:      {}", stats.scan_errors);

    Ok(())
}

/// Logs go to stderr so stdout carries only messages
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}
