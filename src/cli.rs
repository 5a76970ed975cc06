// src/cli.rs
//! CLI definitions for conary-render
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "conary-render")]
#[command(author = "Conary Project")]
#[command(version)]
#[command(about = "Render recipe metadata: variants, pinned requirements and build strings", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that renders a recipe
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Render configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Variant config files (YAML), applied in order on top of the config
    #[arg(short = 'm', long = "variant-config")]
    pub variant_configs: Vec<PathBuf>,

    /// Target platform subdir (e.g. linux-aarch64)
    #[arg(long)]
    pub target_platform: Option<String>,

    /// Build root directory
    #[arg(long)]
    pub croot: Option<PathBuf>,

    /// Never download sources
    #[arg(long)]
    pub no_download_source: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a recipe and print the metadata of every variant as YAML
    Render {
        /// Recipe directory or meta.yaml file
        recipe: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,

        /// Stop before resolving, pinning and hashing requirements
        #[arg(long)]
        no_finalize: bool,

        /// Keep unsatisfiable build/host requirements as written
        #[arg(long)]
        bypass_env_check: bool,

        /// Write the YAML to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the artifact path of every variant of a recipe
    OutputPath {
        /// Recipe directory or meta.yaml file
        recipe: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },
}
