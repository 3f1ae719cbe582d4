//! seqfuzz: replay and inspect call sequence reproducer files
//!
//! Reproducer files hold a call sequence the fuzzer found interesting along
//! with the contracts it targets and the engine config it ran under.
//!
//! ## Features
//!
//! - **replay**: Execute a reproducer on a fresh in-memory chain
//! - **validate**: Check a reproducer file without executing it
//!
//! ## Example Usage
//!
//! ```bash
//! # Replay and show a trace of the last call
//! seqfuzz replay crash.json --trace
//!
//! # Trace every call and keep the executed record
//! seqfuzz replay crash.json --verbose-trace --out executed.json
//!
//! # Check a file before committing it to the corpus
//! seqfuzz validate crash.json --json
//! ```

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod seqfuzz_cli;

use seqfuzz_cli::{output::format_error, replay::ReplayCmd, validate::ValidateCmd};

#[derive(Parser)]
#[command(
    name = "seqfuzz",
    author,
    version,
    about = "Replay and inspect fuzzer call sequences",
    long_about = "Executes call sequence reproducer files block by block on an in-memory chain.\n\n\
                  Honors per-call block delays, block gas capacity and contract setup hooks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a reproducer file's call sequence
    Replay(ReplayCmd),

    /// Check a reproducer file without executing it
    Validate(ValidateCmd),
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let Cli {
        command,
        json,
        verbose,
    } = Cli::parse();
    init_logging(verbose);

    let result = match command {
        Commands::Replay(cmd) => cmd.execute(json, verbose),
        Commands::Validate(cmd) => cmd.execute(json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", format_error(&err, json).trim_end());
            ExitCode::FAILURE
        }
    }
}
