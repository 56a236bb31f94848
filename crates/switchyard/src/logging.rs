//! Tracing subscriber setup.

use crate::config::{LogFormat, LoggingConfig};
use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. The filter is taken from `level_override`,
/// then `RUST_LOG`, then the configured level. Logs go to stderr so command
/// output stays clean.
pub fn init_tracing(config: &LoggingConfig, level_override: Option<&str>) -> anyhow::Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = parse_filter(filter_directive(&config.level, level_override, env.as_deref()))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    }
    .context("Failed to install tracing subscriber")
}

fn filter_directive<'a>(
    configured: &'a str,
    level_override: Option<&'a str>,
    env: Option<&'a str>,
) -> &'a str {
    level_override
        .or(env.filter(|directives| !directives.trim().is_empty()))
        .unwrap_or(configured)
}

fn parse_filter(directives: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .with_context(|| format!("Invalid log level directive '{}'", directives))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive_precedence() {
        assert_eq!(filter_directive("info", Some("debug"), Some("warn")), "debug");
        assert_eq!(filter_directive("info", None, Some("warn")), "warn");
        assert_eq!(filter_directive("info", None, Some("  ")), "info");
        assert_eq!(filter_directive("info", None, None), "info");
    }

    #[test]
    fn test_parse_filter() {
        assert!(parse_filter("info").is_ok());
        assert!(parse_filter("switchyard=debug,warn").is_ok());
        assert!(parse_filter("switchyard=[").is_err());
    }
}
