use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a code variant and its relative dependencies
    ///
    /// Follows relative imports from the entry file, flattens every loaded
    /// file into one directory and rewrites imports to match.
    Load(LoadArgs),

    /// Run or query the shared types server
    Types(TypesArgs),
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Entry file of the variant
    #[arg(value_name = "ENTRY")]
    pub entry: PathBuf,

    /// Maximum import depth to follow (overrides config)
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Maximum number of files, entry included (overrides config)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(usize))]
    pub max_files: Option<usize>,

    /// Load only the entry file
    #[arg(long)]
    pub no_dependencies: bool,

    /// Print the loaded variant as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TypesArgs {
    /// Base directory for the lock file and socket (CI temp dirs take precedence)
    #[arg(long, global = true, value_name = "DIR")]
    pub socket_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: TypesCommand,
}

#[derive(Subcommand, Debug)]
pub enum TypesCommand {
    /// Take part in the election and serve until interrupted
    Serve,

    /// Send one process-types request for an entry file
    Request {
        /// Entry file to process
        #[arg(value_name = "ENTRY")]
        entry: PathBuf,

        /// Maximum import depth to follow
        #[arg(long, value_name = "N")]
        max_depth: Option<usize>,

        /// Maximum number of files, entry included
        #[arg(long, value_name = "N")]
        max_files: Option<usize>,
    },

    /// Show the socket directory, endpoint and lock state
    Status,
}
