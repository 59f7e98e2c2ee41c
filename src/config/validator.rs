//! Config validation: values that parse but cannot work.

use crate::config::AppConfig;
use crate::error::ConfigError;

pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.store.database_url.trim().is_empty() {
        return Err(ConfigError::Validation("database url must not be empty".into()));
    }
    if config.store.max_connections == 0 {
        return Err(ConfigError::Validation("max connections must be at least 1".into()));
    }
    if config.store.acquire_timeout_secs == 0 {
        return Err(ConfigError::Validation("acquire timeout must be at least 1 second".into()));
    }
    if config.server.body_limit == 0 {
        return Err(ConfigError::Validation("body limit must be positive".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut config = AppConfig::default();
        config.store.max_connections = 0;
        assert!(validate(&config).is_err());

        let mut config = AppConfig::default();
        config.server.body_limit = 0;
        assert!(validate(&config).is_err());

        let mut config = AppConfig::default();
        config.store.database_url = "  ".into();
        assert!(validate(&config).is_err());
    }
}
