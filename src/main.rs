mod assets;
mod chapters;
mod cleanup;
mod cli;
mod commands;
mod model;
mod normalize;
mod pipeline;
mod report;
mod section_key;
mod structure;
mod tables;
mod titles;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Reorganize(args) => commands::reorganize::run(args),
        Commands::Clean(args) => commands::clean::run(args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Run(args) => commands::run::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
