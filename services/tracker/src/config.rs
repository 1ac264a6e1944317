//! services/tracker/src/config.rs
//!
//! Defines the service's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which document store backs the remote side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteBackend {
    /// In-process tree. Data lives as long as the process.
    Memory,
    /// A Firebase Realtime Database reached over its REST and streaming API.
    Firebase { url: String, auth: Option<String> },
}

/// The credentials of the admin inserted into an empty local cache.
#[derive(Clone, Debug)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub remote: RemoteBackend,
    pub seed_admin: SeedAdmin,
    /// Browser origin allowed by CORS. Any origin when unset.
    pub cors_origin: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address = parse_var::<SocketAddr>("BIND_ADDRESS", &var_or("BIND_ADDRESS", "0.0.0.0:3000"))?;
        let database_url = var_or("DATABASE_URL", "sqlite://employee_tracker.db?mode=rwc");

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Remote Store ---
        let remote = match var_or("REMOTE_BACKEND", "memory").to_lowercase().as_str() {
            "memory" => RemoteBackend::Memory,
            "firebase" => {
                let url = lookup("FIREBASE_URL").ok_or_else(|| ConfigError::MissingVar("FIREBASE_URL".to_string()))?;
                RemoteBackend::Firebase {
                    url: url.trim_end_matches('/').to_string(),
                    auth: lookup("FIREBASE_AUTH").filter(|token| !token.is_empty()),
                }
            }
            other => {
                return Err(ConfigError::InvalidValue(
                    "REMOTE_BACKEND".to_string(),
                    format!("'{}' is not one of memory, firebase", other),
                ))
            }
        };

        // --- Seed Data ---
        let seed_admin = SeedAdmin {
            email: var_or("SEED_ADMIN_EMAIL", "Poorvika@admin"),
            password: var_or("SEED_ADMIN_PASSWORD", "admin123"),
        };

        let cors_origin = lookup("CORS_ORIGIN").filter(|origin| !origin.is_empty());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            remote,
            seed_admin,
            cors_origin,
        })
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.database_url, "sqlite://employee_tracker.db?mode=rwc");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.remote, RemoteBackend::Memory);
        assert_eq!(config.seed_admin.email, "Poorvika@admin");
        assert_eq!(config.cors_origin, None);
    }

    #[test]
    fn firebase_backend_needs_a_url() {
        let err = config_from(&[("REMOTE_BACKEND", "firebase")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref key) if key == "FIREBASE_URL"));

        let config = config_from(&[
            ("REMOTE_BACKEND", "Firebase"),
            ("FIREBASE_URL", "https://tracker.example.com/"),
            ("FIREBASE_AUTH", "secret"),
        ])
        .unwrap();
        assert_eq!(
            config.remote,
            RemoteBackend::Firebase {
                url: "https://tracker.example.com".to_string(),
                auth: Some("secret".to_string()),
            }
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config_from(&[("RUST_LOG", "chatty")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            config_from(&[("BIND_ADDRESS", "not-an-address")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            config_from(&[("REMOTE_BACKEND", "postgres")]),
            Err(ConfigError::InvalidValue(..))
        ));
    }
}
