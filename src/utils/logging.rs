//! Diagnostic logging for the command line tool.
//!
//! The subscriber is only installed when `EXPLICIT_FOLDING_LOG` (or
//! `RUST_LOG`) is set. Output goes to stderr so it never mixes with the
//! ranges printed on stdout.
//!
//! ```bash
//! EXPLICIT_FOLDING_LOG=debug explicit-folding fold src/main.rs
//! EXPLICIT_FOLDING_LOG=trace EXPLICIT_FOLDING_LOG_FORMAT=json explicit-folding fold notes.md
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

const LOG_VAR: &str = "EXPLICIT_FOLDING_LOG";
const LOG_FORMAT_VAR: &str = "EXPLICIT_FOLDING_LOG_FORMAT";

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Standard flat text lines (default).
    Text,
    /// Newline-delimited JSON objects.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    fn from_env() -> Self {
        Self::parse(&std::env::var(LOG_FORMAT_VAR).unwrap_or_default())
    }
}

/// `EXPLICIT_FOLDING_LOG` takes precedence over `RUST_LOG`.
fn build_filter() -> EnvFilter {
    match std::env::var(LOG_VAR) {
        Ok(value) => EnvFilter::builder().parse_lossy(value),
        Err(_) => EnvFilter::from_default_env(),
    }
}

/// Installs the global tracing subscriber, or does nothing when logging was
/// not requested.
pub fn init_tracing() {
    if std::env::var(LOG_VAR).is_err() && std::env::var("RUST_LOG").is_err() {
        return;
    }

    let filter = build_filter();
    match LogFormat::from_env() {
        LogFormat::Json => {
            let json_layer = fmt::layer().json().with_writer(std::io::stderr);
            Registry::default().with(filter).with(json_layer).init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse(""), LogFormat::Text);
        assert_eq!(LogFormat::parse("tree"), LogFormat::Text);
    }
}
