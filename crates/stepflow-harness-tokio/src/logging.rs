//! Process-wide logging set-up for scenario runs.
//!
//! Logs go to stderr so they interleave with test harness output rather than
//! with progress lines a notifier may write. Records emitted through the `log`
//! facade, which the engine uses, are forwarded into the same subscriber.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::config::HarnessConfig;

fn filter_from_config(config: &HarnessConfig) -> EnvFilter {
    EnvFilter::new(config.log_level.as_filter_str())
}

/// Initialise logging based on configuration.
///
/// Installs a `tracing` fmt subscriber filtered at `config.log_level` and
/// bridges `log` records into it.
///
/// # Note
///
/// If a global subscriber or logger is already set, this function silently
/// ignores the error. The first initialisation wins, which is what concurrent
/// tests calling it repeatedly need.
pub fn init_logging(config: &HarnessConfig) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter_from_config(config))
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
    if installed.is_ok() {
        tracing::debug!(level = config.log_level.as_filter_str(), "logging initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn init_logging_is_idempotent() {
        let config = HarnessConfig::default();
        init_logging(&config);
        init_logging(&config);
    }

    #[test]
    fn filter_uses_config_log_level() {
        let config = HarnessConfig::default().with_log_level(LogLevel::Debug);
        let filter = filter_from_config(&config);
        assert_eq!(filter.to_string(), "debug");
    }
}
