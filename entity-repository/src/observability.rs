//! Tracing subscriber setup

#[cfg(feature = "observability")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "observability")]
use crate::config::LogFormat;
use crate::{config::Config, error::Result};

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `logging.level`; an unparsable level falls
/// back to `info`. Calling this again once a subscriber is installed leaves the
/// existing one in place.
#[cfg(feature = "observability")]
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .try_init(),
    };

    match installed {
        Ok(()) => tracing::info!(
            format = %config.logging.format,
            level = %config.logging.level,
            "Tracing initialized"
        ),
        Err(_) => tracing::debug!("Tracing subscriber already installed"),
    }

    Ok(())
}

/// Install the global tracing subscriber (no-op without the observability feature)
#[cfg(not(feature = "observability"))]
pub fn init_tracing(_config: &Config) -> Result<()> {
    Ok(())
}

/// Shutdown tracing and flush pending output
#[cfg(feature = "observability")]
pub fn shutdown_tracing() {
    tracing::info!("Tracing shutdown complete");
}

/// Shutdown tracing (no-op without the observability feature)
#[cfg(not(feature = "observability"))]
pub fn shutdown_tracing() {
    tracing::debug!("Tracing shutdown (no-op)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingConfig;

    #[test]
    fn test_init_tracing_is_repeatable() {
        let config = Config::default();
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_ok());
    }

    #[test]
    fn test_init_tracing_with_bad_level() {
        let config = Config {
            logging: LoggingConfig {
                level: "not a [filter".to_string(),
                ..LoggingConfig::default()
            },
            ..Config::default()
        };
        assert!(init_tracing(&config).is_ok());
        shutdown_tracing();
    }

    #[test]
    fn test_shutdown_without_init() {
        shutdown_tracing();
    }
}
