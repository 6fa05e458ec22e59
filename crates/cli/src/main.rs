use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use concord_engine::{CancelToken, Mode};
use tracing_subscriber::EnvFilter;

mod commands;
mod settings;

/// Exit code for a run stopped by Ctrl-C (128 + SIGINT).
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "concord")]
#[command(about = "Reconcile a bank statement against a ledger export")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match bank transactions against ledger transactions
    #[command(after_help = "\
Files ending in .ofx or .qfx are read as OFX statements, anything else as CSV.
CSV columns are detected from the header row unless concord.toml maps them.

Examples:
  concord reconcile --bank statement.ofx --ledger books.csv --report recon.md
  concord reconcile --bank bank.csv --ledger books.csv --mode speed --csv out.csv")]
    Reconcile(commands::ReconcileArgs),

    /// Validate a config file and print the effective engine settings
    CheckConfig {
        /// Path to concord.toml
        file: PathBuf,

        /// Preset to resolve against instead of the file's own mode
        #[arg(long)]
        mode: Option<Mode>,
    },
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Reconcile(args) => {
            init_tracing(args.quiet);
            run_reconcile(args).await
        }
        Commands::CheckConfig { file, mode } => {
            init_tracing(false);
            commands::check_config(&file, mode).map(|()| ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_reconcile(args: commands::ReconcileArgs) -> anyhow::Result<ExitCode> {
    let token = CancelToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping at the next checkpoint");
            signal_token.cancel();
        }
    });

    let outcome = tokio::task::spawn_blocking(move || commands::reconcile(&args, token)).await??;
    if outcome.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_CANCELLED))
    }
}
