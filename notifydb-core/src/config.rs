//! Connection and behavior configuration.
//!
//! [`DatabaseConfig`] describes where the backing store lives and is consumed by backend
//! builders. [`StoreOptions`] tunes how the [`DocumentStore`](crate::store::DocumentStore)
//! itself behaves.

use serde::{Deserialize, Serialize};
use std::{env, time::Duration};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    filter::CoercionPolicy,
};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 27017;
const DEFAULT_DATABASE: &str = "notification";
const DEFAULT_AUTH_DB: &str = "admin";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for a backing document store.
///
/// # Example
///
/// ```ignore
/// use notifydb_core::config::DatabaseConfig;
///
/// let config = DatabaseConfig::from_env()?;
/// println!("connecting to {}:{}", config.host, config.port);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    pub database: String,
    #[serde(default = "default_auth_db")]
    pub auth_db: String,
    /// Connect and server-selection timeout, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

fn default_auth_db() -> String {
    DEFAULT_AUTH_DB.to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: String::new(),
            pass: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            auth_db: default_auth_db(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl DatabaseConfig {
    /// Reads the configuration from `NOTIFYDB_*` environment variables.
    ///
    /// Unset or empty variables fall back to the [`Default`] values.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Connection`] if the port or timeout is not a number.
    pub fn from_env() -> DocumentStoreResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, applying the same fallbacks as
    /// [`DatabaseConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> DocumentStoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str, fallback: String| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .unwrap_or(fallback)
        };

        Ok(Self {
            host: read("NOTIFYDB_HOST", defaults.host),
            port: parse_setting("NOTIFYDB_PORT", &read("NOTIFYDB_PORT", defaults.port.to_string()))?,
            user: read("NOTIFYDB_USER", defaults.user),
            pass: read("NOTIFYDB_PASS", defaults.pass),
            database: read("NOTIFYDB_DATABASE", defaults.database),
            auth_db: read("NOTIFYDB_AUTH_DB", defaults.auth_db),
            connect_timeout: parse_setting(
                "NOTIFYDB_CONNECT_TIMEOUT",
                &read("NOTIFYDB_CONNECT_TIMEOUT", defaults.connect_timeout.to_string()),
            )?,
        })
    }

    /// Returns the connect timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Returns the `host:port` address of the store.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_setting<T: std::str::FromStr>(key: &str, value: &str) -> DocumentStoreResult<T> {
    value
        .parse()
        .map_err(|_| DocumentStoreError::Connection(format!("{key} is not a valid number: {value}")))
}

/// Behavior switches for a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreOptions {
    /// How filter values that fail to coerce are handled.
    pub coercion: CoercionPolicy,
    /// Drop every secondary index of a collection before each insert.
    ///
    /// Off by default. Index management is normally done through
    /// [`DocumentStore::drop_indexes`](crate::store::DocumentStore::drop_indexes).
    pub drop_indexes_on_insert: bool,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the coercion policy used by the filter normalizer.
    pub fn with_coercion(mut self, coercion: CoercionPolicy) -> Self {
        self.coercion = coercion;
        self
    }

    /// Enables or disables dropping indexes before each insert.
    pub fn with_drop_indexes_on_insert(mut self, enabled: bool) -> Self {
        self.drop_indexes_on_insert = enabled;
        self
    }
}
