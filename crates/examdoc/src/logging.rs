use std::env;

use tracing::debug;
use tracing_subscriber::EnvFilter;

pub const VERBOSE_ENV: &str = "EXAMDOC_VERBOSE";

/// Installs the global subscriber. `RUST_LOG` wins; otherwise the default
/// level is `info`, or `debug` when verbose.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if verbose {
        debug!("verbose logging enabled");
    }
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

pub fn env_flag() -> bool {
    env::var(VERBOSE_ENV)
        .map(|value| parse_bool(&value))
        .unwrap_or(false)
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for raw in ["1", "true", " YES ", "On"] {
            assert!(parse_bool(raw), "{raw}");
        }
        for raw in ["", "0", "off", "nope"] {
            assert!(!parse_bool(raw), "{raw}");
        }
    }

    #[test]
    fn verbose_raises_default_level() {
        assert_eq!(default_directive(false), "info");
        assert_eq!(default_directive(true), "debug");
    }
}
