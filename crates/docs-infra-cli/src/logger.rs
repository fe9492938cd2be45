//! Logging setup for the `docs-infra` binary.
//!
//! Log lines go to stderr so `load --json` output on stdout stays parseable.
//!
//! Level precedence:
//! 1. `--verbose`: DEBUG for the docs-infra crates
//! 2. `--quiet`: ERROR only
//! 3. `RUST_LOG`
//! 4. `log_level` from the config file
//! 5. INFO

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: [&str; 4] = [
    "docs_infra_loader",
    "docs_infra_types",
    "docs_infra_config",
    "docs_infra_cli",
];

fn directives(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Build the filter for the given flags and configured level.
pub fn build_filter(verbose: bool, quiet: bool, configured: Option<&str>) -> EnvFilter {
    if verbose {
        return EnvFilter::new(directives("debug"));
    }
    if quiet {
        return EnvFilter::new("error");
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    match configured {
        Some(level) => EnvFilter::try_new(directives(level))
            .unwrap_or_else(|_| EnvFilter::new(directives("info"))),
        None => EnvFilter::new(directives("info")),
    }
}

/// Initialize the global tracing subscriber. Call once, before any logging.
///
/// ```rust,no_run
/// use docs_infra_cli::logger::init_logger;
///
/// init_logger(false, false, false, Some("warn"));
/// tracing::warn!("shown");
/// tracing::info!("hidden");
/// ```
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool, configured: Option<&str>) {
    init_logger_with_filter(build_filter(verbose, quiet, configured), no_color);
}

/// Initialize with an explicit filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && should_use_colors())
        .compact();

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Whether stderr output should be colored.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` forces them; otherwise the
/// terminal decides.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_directives_cover_all_crates() {
        let d = directives("debug");
        for krate in CRATES {
            assert!(d.contains(&format!("{krate}=debug")));
        }
    }

    #[test]
    fn test_verbose_filter() {
        let filter = build_filter(true, false, Some("error"));
        assert!(filter.to_string().contains("docs_infra_types=debug"));
    }

    #[test]
    #[serial]
    fn test_configured_level_used_without_rust_log() {
        unsafe {
            std::env::remove_var("RUST_LOG");
        }
        let filter = build_filter(false, false, Some("warn"));
        assert!(filter.to_string().contains("docs_infra_loader=warn"));
    }

    #[test]
    #[serial]
    fn test_invalid_configured_level_falls_back_to_info() {
        unsafe {
            std::env::remove_var("RUST_LOG");
        }
        let filter = build_filter(false, false, Some("not a level!!"));
        assert!(filter.to_string().contains("docs_infra_cli=info"));
    }

    #[test]
    #[serial]
    fn test_force_color() {
        unsafe {
            std::env::remove_var("NO_COLOR");
            std::env::set_var("FORCE_COLOR", "1");
        }
        assert!(should_use_colors());
        unsafe {
            std::env::set_var("NO_COLOR", "1");
        }
        assert!(!should_use_colors());
        unsafe {
            std::env::remove_var("NO_COLOR");
            std::env::remove_var("FORCE_COLOR");
        }
    }
}
