//! Status messages on stderr.

use owo_colors::OwoColorize;

pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Indented detail line under a status message.
pub fn detail(label: &str, value: impl std::fmt::Display) {
    eprintln!("  {} {}", format!("{label}:").dimmed(), value);
}
