// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries rendered YAML and paths
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            recipe,
            config,
            no_finalize,
            bypass_env_check,
            output,
        } => commands::cmd_render(&recipe, &config, no_finalize, bypass_env_check, output.as_deref()),
        Commands::OutputPath { recipe, config } => commands::cmd_output_path(&recipe, &config),
    }
}
