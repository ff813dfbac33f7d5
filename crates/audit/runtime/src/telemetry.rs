use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{AuditError, AuditResult};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `config.level`. Returns `Ok(false)` when a
/// subscriber was already installed, so calling this twice is harmless.
pub fn init_tracing(config: &LoggingConfig) -> AuditResult<bool> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| AuditError::Config(format!("logging.level {:?}: {}", config.level, e)))?,
    };

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };
    Ok(installed.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_not_an_error() {
        let config = LoggingConfig::default();
        assert!(init_tracing(&config).is_ok());
        assert_eq!(init_tracing(&config).unwrap(), false);
    }
}
