// file: src/utils/logging.rs
// description: tracing subscriber initialization and colored cli messages

use colored::*;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber. Logs go to stderr so stdout only carries
/// results. `RUST_LOG` overrides the level chosen by `verbose`.
///
/// Returns false when a subscriber was already installed.
pub fn init_logger(colored_output: bool, verbose: bool) -> bool {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .with_ansi(colored_output);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

pub fn format_success(msg: &str) -> String {
    format!("{} {}", "✓".green().bold(), msg.green())
}

pub fn format_error(msg: &str) -> String {
    format!("{} {}", "✗".red().bold(), msg.red())
}

pub fn format_warning(msg: &str) -> String {
    format!("{} {}", "⚠".yellow().bold(), msg.yellow())
}

pub fn format_info(msg: &str) -> String {
    format!("{} {}", "ℹ".blue().bold(), msg)
}

pub fn format_step(step: usize, total: usize, msg: &str) -> String {
    format!("{} {}", format!("[{}/{}]", step, total).cyan().bold(), msg)
}

/// One line per query: the query, then its estimand or the hedge marker.
pub fn format_identified(query: &str, estimand: &str, identifiable: bool) -> String {
    if identifiable {
        format!("{} {} = {}", "✓".green().bold(), query.bold(), estimand)
    } else {
        format!("{} {} {}", "✗".red().bold(), query.bold(), "is not identifiable".red())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_keep_text() {
        colored::control::set_override(false);
        assert_eq!(format_step(2, 5, "identify"), "[2/5] identify");
        assert_eq!(format_identified("P(y | do(x))", "P(y | x)", true), "✓ P(y | do(x)) = P(y | x)");
        assert!(format_identified("P(y | do(x))", "HEDGE", false).ends_with("is not identifiable"));
        assert_eq!(format_warning("x is isolated"), "⚠ x is isolated");
        colored::control::unset_override();
    }

    #[test]
    fn test_second_init_is_reported() {
        init_logger(false, false);
        assert!(!init_logger(false, true));
    }
}
