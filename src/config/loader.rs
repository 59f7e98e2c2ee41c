//! Load config from the environment (and a `.env` file when present).

use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::str::FromStr;

pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const MAX_CONNECTIONS_VAR: &str = "DOC_BLUEPRINT_MAX_CONNECTIONS";
pub const ACQUIRE_TIMEOUT_VAR: &str = "DOC_BLUEPRINT_ACQUIRE_TIMEOUT_SECS";
pub const BIND_VAR: &str = "DOC_BLUEPRINT_BIND";
pub const BODY_LIMIT_VAR: &str = "DOC_BLUEPRINT_BODY_LIMIT";

fn parse_var<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(s) => s.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            message: format!("'{}': {}", s, e),
        }),
    }
}

impl AppConfig {
    /// Read `.env` (if any) then the process environment.
    pub fn from_env() -> Result<AppConfig, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = AppConfig {
            store: StoreConfig {
                database_url: lookup(DATABASE_URL_VAR).unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
                max_connections: parse_var(MAX_CONNECTIONS_VAR, lookup(MAX_CONNECTIONS_VAR), DEFAULT_MAX_CONNECTIONS)?,
                acquire_timeout_secs: parse_var(
                    ACQUIRE_TIMEOUT_VAR,
                    lookup(ACQUIRE_TIMEOUT_VAR),
                    DEFAULT_ACQUIRE_TIMEOUT_SECS,
                )?,
            },
            server: ServerConfig {
                bind: parse_var(BIND_VAR, lookup(BIND_VAR), ServerConfig::default().bind)?,
                body_limit: parse_var(BODY_LIMIT_VAR, lookup(BODY_LIMIT_VAR), DEFAULT_BODY_LIMIT)?,
            },
        };
        validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_keys_use_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.bind.to_string(), DEFAULT_BIND);
    }

    #[test]
    fn values_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            (DATABASE_URL_VAR, "postgres://db/blog"),
            (MAX_CONNECTIONS_VAR, "3"),
            (BIND_VAR, "0.0.0.0:8080"),
            (BODY_LIMIT_VAR, "1024"),
        ]))
        .unwrap();
        assert_eq!(config.store.database_url, "postgres://db/blog");
        assert_eq!(config.store.max_connections, 3);
        assert_eq!(config.server.bind.port(), 8080);
        assert_eq!(config.server.body_limit, 1024);
    }

    #[test]
    fn bad_values_name_their_key() {
        let err = AppConfig::from_lookup(lookup(&[(BIND_VAR, "nowhere")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: BIND_VAR, .. }));
        let err = AppConfig::from_lookup(lookup(&[(MAX_CONNECTIONS_VAR, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
