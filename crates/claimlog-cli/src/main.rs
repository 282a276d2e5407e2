#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "claimlog: append-only audit log of a remote claims authority",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a claimlog project",
        long_about = "Create .claimlog/ with a default config.toml and an empty claims database.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    claimlog init\n\n    # Overwrite an existing config\n    claimlog init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Sync",
        about = "Reconcile identifiers with the remote authority",
        long_about = "Fetch the snapshot and update feed of each identifier and append what changed.\n\
            Identifiers run in parallel; each one commits fully or not at all.",
        after_help = "EXAMPLES:\n    # Sync two researchers against the configured remote\n    claimlog sync 0000-0003-3041-2092 0000-0002-1825-0097\n\n    # Sync from fixture files instead of the network\n    claimlog sync 0000-0003-3041-2092 --fixtures ./fixtures\n\n    # Emit machine-readable output\n    claimlog sync 0000-0003-3041-2092 --json"
    )]
    Sync(cmd::sync::SyncArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the claims log of an identifier",
        long_about = "Print the appended events of one identifier in log order.",
        after_help = "EXAMPLES:\n    # Full log\n    claimlog log 0000-0003-3041-2092\n\n    # History of one subject\n    claimlog log 0000-0003-3041-2092 --subject 2015ASPC..492..150T"
    )]
    Log(cmd::log::LogArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the current claims of an identifier",
        long_about = "Project the claims log into the active claims, generation marker, and checkpoint.",
        after_help = "EXAMPLES:\n    # Active claims\n    claimlog status 0000-0003-3041-2092\n\n    # Emit machine-readable output\n    claimlog status 0000-0003-3041-2092 --json"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Write",
        about = "Append a claim event by hand",
        long_about = "Append one claimed/removed/unchanged event outside of a sync.\n\
            The next sync treats it like any other entry, ordered by sequence.",
        after_help = "EXAMPLES:\n    # Record a manual removal\n    claimlog record 0000-0003-3041-2092 2014AAS...22325503A --status removed\n\n    # Record a claim with a date and provenance\n    claimlog record 0000-0003-3041-2092 2016ApJ...817...13A --status claimed --at 2015-11-05T11:37:33Z --provenance curator"
    )]
    Record(cmd::record::RecordArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CLAIMLOG_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "claimlog=debug,claimlog_core=debug,info"
        } else {
            "claimlog=info,claimlog_core=info,warn"
        })
    });

    let format = env::var("CLAIMLOG_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        debug!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();

    match cli.command {
        Commands::Init(args) => cmd::init::run_init(&args, output, &project_root),
        Commands::Sync(args) => cmd::sync::run_sync(&args, output, &project_root),
        Commands::Log(args) => cmd::log::run_log(&args, output, &project_root),
        Commands::Status(args) => cmd::status::run_status(&args, output, &project_root),
        Commands::Record(args) => cmd::record::run_record(&args, output, &project_root),
    }
}
