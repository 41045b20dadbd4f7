//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Filter directive for a base level raised by `-v` flags
///
/// SSH transport internals stay at `warn` until `-vvv`.
#[must_use]
pub fn filter_directive(level: &str, verbosity: u8) -> String {
    match verbosity {
        0 => format!("{level},russh=warn"),
        1 => "info,russh=warn".to_string(),
        2 => "debug,russh=warn".to_string(),
        _ => "trace,russh=debug".to_string(),
    }
}

/// Create an environment filter; `RUST_LOG` wins when set
fn create_env_filter(config: &LogConfig, verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(&config.level, verbosity)))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber; logs go to stderr so stdout stays parseable
pub fn init(config: &LogConfig, verbosity: u8) {
    let filter = create_env_filter(config, verbosity);

    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("error", 0), "error,russh=warn");
        assert_eq!(filter_directive("error", 2), "debug,russh=warn");
        assert_eq!(filter_directive("error", 5), "trace,russh=debug");
    }

    #[test]
    fn test_directives_parse() {
        for verbosity in 0..4 {
            assert!(EnvFilter::try_new(filter_directive("info", verbosity)).is_ok());
        }
    }
}
