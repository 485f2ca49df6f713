//! Tracing subscriber setup for the command-line tool
//!
//! The library only emits `tracing` events; installing a subscriber is left to the binary.

use crate::config::{LogFormat, LoggingSettings};
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log level `{0}`")]
    Level(String),

    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Install a global subscriber writing to stderr; `RUST_LOG` takes precedence over `level`
pub fn init(logging: &LoggingSettings) -> Result<(), TelemetryError> {
    let level: LevelFilter = logging
        .level
        .parse()
        .map_err(|_| TelemetryError::Level(logging.level.clone()))?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_level() {
        let logging = LoggingSettings {
            level: "loud".to_string(),
            format: LogFormat::Compact,
        };
        assert!(matches!(init(&logging), Err(TelemetryError::Level(level)) if level == "loud"));
    }
}
