//! Log filter selection.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "DISCOVERY_LOG";

/// Builds the event filter.
///
/// Precedence: `DISCOVERY_LOG`, `RUST_LOG`, the configured filter, then
/// `info` (`debug` when verbose). Unparseable directives fall through to the
/// next source.
#[must_use]
pub fn build_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    build_filter_from(config, verbose, |key| std::env::var(key).ok())
}

pub(crate) fn build_filter_from(
    config: &LoggingConfig,
    verbose: bool,
    lookup: impl Fn(&str) -> Option<String>,
) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    [lookup(LOG_ENV), lookup("RUST_LOG"), config.filter.clone()]
        .into_iter()
        .flatten()
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_log_wins() {
        let config = LoggingConfig {
            filter: Some("warn".to_string()),
            ..LoggingConfig::default()
        };
        let filter = build_filter_from(&config, false, |key| {
            (key == LOG_ENV).then(|| "discovery_index=trace".to_string())
        });
        assert_eq!(filter.to_string(), "discovery_index=trace");
    }

    #[test]
    fn test_configured_filter_used_without_env() {
        let config = LoggingConfig {
            filter: Some("warn".to_string()),
            ..LoggingConfig::default()
        };
        assert_eq!(build_filter_from(&config, true, |_| None).to_string(), "warn");
    }

    #[test]
    fn test_verbose_fallback() {
        let config = LoggingConfig::default();
        assert_eq!(build_filter_from(&config, true, |_| None).to_string(), "debug");
        assert_eq!(build_filter_from(&config, false, |_| None).to_string(), "info");
    }
}
