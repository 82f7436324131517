mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, roundtrip, sync, CheckArgs, RoundtripArgs, SyncArgs};
use config::Config;
use tracing_subscriber::EnvFilter;

/// Weft CLI - structural sync tools for XML-like documents
#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a document and report its diagnostics
    Check(CheckArgs),

    /// Verify that a document survives parse + serialize byte for byte
    Roundtrip(RoundtripArgs),

    /// Sync one version of a document to another and print the units
    Sync(SyncArgs),
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?.display().to_string();
    let config = Config::load(&cwd)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Check(args) => check(args),
        Command::Roundtrip(args) => roundtrip(args),
        Command::Sync(args) => sync(args, &config),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
