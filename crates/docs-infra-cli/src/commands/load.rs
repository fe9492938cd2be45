//! `docs-infra load` implementation.

use std::time::Instant;

use docs_infra_config::DocsInfraConfig;
use docs_infra_loader::{
    LoadedVariant, LoaderOptions, NativeRuntime, load_variant_code_with_dependencies,
};
use tracing::debug;

use crate::cli::LoadArgs;
use crate::config::loader_options;
use crate::error::{CliError, Result, ResultExt};
use crate::ui;

/// Apply command line overrides on top of the configured loader options.
pub fn resolve_options(args: &LoadArgs, config: &DocsInfraConfig) -> Result<LoaderOptions> {
    let mut options = loader_options(&config.loader);
    if let Some(max_depth) = args.max_depth {
        options.max_depth = max_depth;
    }
    if let Some(max_files) = args.max_files {
        if max_files == 0 {
            return Err(CliError::InvalidArgument(
                "--max-files must be at least 1 (the entry counts)".to_string(),
            ));
        }
        options.max_files = max_files;
    }
    if args.no_dependencies {
        options.include_dependencies = false;
    }
    Ok(options)
}

/// Load the entry and print the flattened variant.
///
/// With `--json` the full [`LoadedVariant`] goes to stdout; otherwise a
/// summary and any warnings go to stderr.
pub async fn execute(args: LoadArgs, config: &DocsInfraConfig) -> Result<()> {
    let options = resolve_options(&args, config)?;
    let entry = std::path::absolute(&args.entry).with_path(&args.entry)?;
    debug!(entry = %entry.display(), ?options, "loading variant");

    let started = Instant::now();
    let loaded =
        load_variant_code_with_dependencies(&entry, &NativeRuntime::new(), &options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&loaded)?);
    } else {
        print_summary(&loaded, started.elapsed());
    }
    Ok(())
}

fn print_summary(loaded: &LoadedVariant, elapsed: std::time::Duration) {
    let count = loaded.variant.file_count();
    ui::success(&format!(
        "Loaded {} file{} in {}ms",
        count,
        if count == 1 { "" } else { "s" },
        elapsed.as_millis()
    ));
    for (name, path) in loaded.variant.files_order.iter().zip(&loaded.visited_files) {
        ui::detail(name, path.display());
    }
    for warning in &loaded.warnings {
        ui::warning(warning);
    }
}
