mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{evaluate, impute};

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("blockfill={level},blockfill_cli={level}").into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Commands::Impute(args) => impute::run(&cli, args),
        Commands::Evaluate(args) => evaluate::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
