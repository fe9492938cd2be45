//! Command-line interface definition.
//!
//! - `docs-infra load` - load a code variant with its relative dependencies
//! - `docs-infra types` - run or query the shared types server

mod commands;

use clap::Parser;
use std::path::PathBuf;

pub use commands::{Command, LoadArgs, TypesArgs, TypesCommand};

/// docs-infra - documentation build helpers
#[derive(Parser, Debug)]
#[command(
    name = "docs-infra",
    version,
    about = "Load documentation code variants and share a types server across build processes"
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to a config file (default: ./docs-infra.toml if present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
