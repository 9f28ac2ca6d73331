use std::{env, fmt::Display, fs, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {message}")]
    Invalid {
        key: &'static str,
        value: String,
        message: String,
    },
    #[error("failed to read resource definitions from {path}: {source}")]
    ReadResources {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where records are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub store_timeout: Duration,
    pub resources_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store_timeout_ms: u64 = try_load(&lookup, "STORE_TIMEOUT_MS", "5000")?;
        Ok(Self {
            host: try_load(&lookup, "HOST", "127.0.0.1")?,
            port: try_load(&lookup, "PORT", "3001")?,
            database_url: try_load(&lookup, "DATABASE_URL", "sqlite://resources.db?mode=rwc")?,
            store_timeout: Duration::from_millis(store_timeout_ms),
            resources_file: lookup("RESOURCES_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn store_backend(&self) -> StoreBackend {
        if self.database_url.eq_ignore_ascii_case("memory") {
            StoreBackend::Memory
        } else {
            StoreBackend::Sqlite(self.database_url.clone())
        }
    }

    /// Contents of `RESOURCES_FILE`, if one is configured.
    pub fn read_resources(&self) -> Result<Option<String>, ConfigError> {
        let Some(path) = &self.resources_file else {
            return Ok(None);
        };
        fs::read_to_string(path)
            .map(Some)
            .map_err(|source| ConfigError::ReadResources {
                path: path.clone(),
                source,
            })
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        debug!("{key} not set, using default: {default}");
        default.to_string()
    });
    value.parse().map_err(|e: T::Err| {
        warn!(key, value = %value, "Invalid configuration value");
        ConfigError::Invalid {
            key,
            value,
            message: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:3001");
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(
            config.store_backend(),
            StoreBackend::Sqlite("sqlite://resources.db?mode=rwc".to_string())
        );
        assert!(config.read_resources().unwrap().is_none());
    }

    #[test]
    fn memory_selects_in_process_store() {
        let config = load(&[("DATABASE_URL", "memory"), ("PORT", "8080")]).unwrap();
        assert_eq!(config.store_backend(), StoreBackend::Memory);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn invalid_values_are_errors() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = load(&[("STORE_TIMEOUT_MS", "-5")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "STORE_TIMEOUT_MS", .. }));
    }

    #[test]
    fn missing_resources_file_is_reported() {
        let config = load(&[("RESOURCES_FILE", "/nonexistent/resources.toml")]).unwrap();
        assert!(matches!(
            config.read_resources(),
            Err(ConfigError::ReadResources { .. })
        ));
    }
}
