//! docs-infra CLI entry point: parses arguments, loads configuration,
//! initializes logging and dispatches the command.

use clap::Parser;
use docs_infra_cli::{cli, commands, config, error, logger};
use docs_infra_cli::Result as CliResult;
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let result: CliResult<()> = async {
        let config = config::load_config(args.config.as_deref())?;
        logger::init_logger(
            args.verbose,
            args.quiet,
            args.no_color,
            config.settings.log_level.as_deref(),
        );

        match args.command {
            cli::Command::Load(load_args) => commands::load_execute(load_args, &config).await,
            cli::Command::Types(types_args) => commands::types_execute(types_args, &config).await,
        }
    }
    .await;

    result.map_err(error::cli_error_to_miette)
}
