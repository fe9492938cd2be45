//! Conversion of CLI errors into miette reports.

use crate::error::CliError;
use docs_infra_config::ConfigError;
use docs_infra_loader::LoadError;
use docs_infra_types::{ClientError, TypesError};
use miette::Report;

/// Render a [`CliError`] with a hint where one helps.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Load(e) => load_error_to_miette(e),
        CliError::Types(e) => types_error_to_miette(e),
        CliError::Config(e) => config_error_to_miette(e),
        _ => miette::miette!("{}", err),
    }
}

fn load_error_to_miette(err: LoadError) -> Report {
    match err {
        LoadError::EntryUnreadable { path, source } => miette::miette!(
            "Failed to read entry file: {}\n{}\n\nHint: Check the path passed to 'docs-infra load'",
            path.display(),
            source
        ),
        other => miette::miette!("{}", other),
    }
}

fn types_error_to_miette(err: TypesError) -> Report {
    match err {
        TypesError::ReadyTimeout { endpoint, after } => miette::miette!(
            "Types server at {} did not become ready within {:?}\n\n\
             Hint: Another process holds the lock but is not serving. \
             Run 'docs-infra types status' or remove the stale lock file",
            endpoint,
            after
        ),
        TypesError::Client(ClientError::Connect { attempts, source }) => miette::miette!(
            "Could not reach the types server after {} attempt(s): {}\n\n\
             Hint: Increase types.connect_max_retries or check the socket directory",
            attempts,
            source
        ),
        other => miette::miette!("{}", other),
    }
}

fn config_error_to_miette(err: ConfigError) -> Report {
    match err {
        ConfigError::NotFound(path) => miette::miette!(
            "Config file not found: {}\n\n\
             Hint: Omit --config to use ./docs-infra.toml, or pass an existing file",
            path.display()
        ),
        other => miette::miette!("Configuration error: {}", other),
    }
}
