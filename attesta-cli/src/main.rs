//! Attesta CLI - capture images into an audited field and verify them later.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod camera;
mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error
  65  Verification failed (image does not match its audit entry)
  66  Input file missing or unreadable
  69  Capture server unavailable or refused the request";

#[derive(Parser)]
#[command(name = "attesta")]
#[command(author, version, about = "Audited image capture for regulated records", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress decorated output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Connection to a capture server.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Capture server origin
    #[arg(long, env = "ATTESTA_SERVER", default_value = "http://localhost:3000")]
    pub server: String,

    /// Bearer token for the capture server
    #[arg(long, env = "ATTESTA_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SHA-256 image hash of one or more files
    Hash {
        /// Files to hash
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Check a stored image against its audit entry
    Verify {
        /// Path to the image as downloaded from the attachment store
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Audit entry id to compare against
        #[arg(long, conflicts_with = "hash", required_unless_present = "hash")]
        entry: Option<i64>,

        /// Expected hash, skipping the ledger lookup
        #[arg(long)]
        hash: Option<String>,

        #[command(flatten)]
        server: ServerArgs,
    },

    /// Upload images as audited captures
    Capture(commands::capture::CaptureArgs),

    /// Read the capture audit ledger
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommand,

        #[command(flatten)]
        server: ServerArgs,

        #[arg(short, long, value_enum, default_value_t, global = true)]
        format: OutputFormat,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "attesta=debug,attesta_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let quiet = cli.quiet;

    let result = match cli.command {
        Commands::Hash { files, format } => commands::hash::execute(files, format),
        Commands::Verify {
            file,
            entry,
            hash,
            server,
        } => commands::verify::execute(file, entry, hash, server, quiet).await,
        Commands::Capture(args) => commands::capture::execute(args, quiet).await,
        Commands::Audit {
            command,
            server,
            format,
        } => commands::audit::execute(command, server, format).await,
    };

    let exit = match result {
        Ok(()) => ExitCode::success(),
        Err(e) => ExitCode::from_anyhow(&e),
    };
    if let Some(message) = &exit.message {
        eprintln!("Error: {message}");
    }
    process::exit(exit.code);
}
