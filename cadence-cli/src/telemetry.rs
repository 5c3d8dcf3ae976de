//! Logging initialization.
//!
//! Filter comes from `CADENCE_LOG` (default `cadence=info`). Logs go to
//! stderr so stdout carries only the run summary.

use crate::error::{CliError, CliResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "CADENCE_LOG";
pub const DEFAULT_FILTER: &str = "cadence=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(format: LogFormat) -> CliResult<()> {
    let registry = tracing_subscriber::registry().with(env_filter());
    let result = match format {
        LogFormat::Human => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|e| CliError::Logging(e.to_string()))?;

    tracing::debug!(format = ?format, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_env_filter_source() {
        {
            let _guard = EnvVarGuard::set(LOG_ENV, None);
            assert_eq!(env_filter().to_string(), DEFAULT_FILTER);
        }
        {
            let _guard = EnvVarGuard::set(LOG_ENV, Some("cadence_scheduler=debug"));
            assert_eq!(env_filter().to_string(), "cadence_scheduler=debug");
        }
    }
}
