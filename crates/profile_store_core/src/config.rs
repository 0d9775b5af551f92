//! Store configuration.
//!
//! # Responsibility
//! - Describe where the profile database lives and how sessions are bounded.
//! - Read overrides from the process environment.
//!
//! # Invariants
//! - Configuration is a plain value passed to `ProfileStore::open`; nothing
//!   here is global or mutable after construction.
//! - `pool_size` and `row_cap` are never zero.

use crate::db::DatabaseLocation;
use crate::repo::attribute_repo::DEFAULT_ROW_CAP;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB: &str = "PROFILE_STORE_DB";
pub const ENV_POOL_SIZE: &str = "PROFILE_STORE_POOL_SIZE";
pub const ENV_TIMEOUT_MS: &str = "PROFILE_STORE_TIMEOUT_MS";
pub const ENV_ROW_CAP: &str = "PROFILE_STORE_ROW_CAP";

const MEMORY_LOCATION: &str = ":memory:";
const DEFAULT_POOL_SIZE: usize = 4;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Malformed configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid {} value `{}`: {}",
            self.variable, self.value, self.reason
        )
    }
}

impl Error for ConfigError {}

/// Settings for opening a [`crate::ProfileStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub location: DatabaseLocation,
    /// Upper bound on concurrently open sessions. Forced to 1 in memory.
    pub pool_size: usize,
    /// Longest wait for a free session.
    pub acquire_timeout: Duration,
    /// Longest wait on a database lock inside one statement.
    pub busy_timeout: Duration,
    /// Default and maximum rows returned by list operations.
    pub row_cap: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: DatabaseLocation::Memory,
            pool_size: DEFAULT_POOL_SIZE,
            acquire_timeout: DEFAULT_TIMEOUT,
            busy_timeout: DEFAULT_TIMEOUT,
            row_cap: DEFAULT_ROW_CAP,
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: DatabaseLocation::File(path.into()),
            ..Self::default()
        }
    }

    /// Builds a config from `PROFILE_STORE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup; unset variables
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_DB) {
            let trimmed = raw.trim();
            config.location = match trimmed {
                "" => {
                    return Err(ConfigError {
                        variable: ENV_DB,
                        value: raw.clone(),
                        reason: "expected a file path or `:memory:`",
                    })
                }
                MEMORY_LOCATION => DatabaseLocation::Memory,
                path => DatabaseLocation::File(PathBuf::from(path)),
            };
        }

        if let Some(raw) = lookup(ENV_POOL_SIZE) {
            config.pool_size = parse_positive(ENV_POOL_SIZE, &raw)?;
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            let millis: u64 = parse_positive(ENV_TIMEOUT_MS, &raw)?;
            config.acquire_timeout = Duration::from_millis(millis);
            config.busy_timeout = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup(ENV_ROW_CAP) {
            config.row_cap = parse_positive(ENV_ROW_CAP, &raw)?;
        }

        Ok(config)
    }
}

fn parse_positive<T>(variable: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let invalid = |reason| ConfigError {
        variable,
        value: raw.to_string(),
        reason,
    };
    let value: T = raw
        .trim()
        .parse()
        .map_err(|_| invalid("expected a positive integer"))?;
    if value == T::default() {
        return Err(invalid("must be greater than zero"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::{StoreConfig, ENV_DB, ENV_POOL_SIZE, ENV_ROW_CAP, ENV_TIMEOUT_MS};
    use crate::db::DatabaseLocation;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.row_cap, 100);
        assert_eq!(config.location, DatabaseLocation::Memory);
    }

    #[test]
    fn overrides_are_applied() {
        let config = StoreConfig::from_lookup(lookup(&[
            (ENV_DB, "/var/lib/profiles/users.db"),
            (ENV_POOL_SIZE, "8"),
            (ENV_TIMEOUT_MS, "250"),
            (ENV_ROW_CAP, "20"),
        ]))
        .unwrap();

        assert_eq!(
            config.location,
            DatabaseLocation::File(PathBuf::from("/var/lib/profiles/users.db"))
        );
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.acquire_timeout, Duration::from_millis(250));
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.row_cap, 20);
    }

    #[test]
    fn memory_marker_selects_in_memory_database() {
        let config = StoreConfig::from_lookup(lookup(&[(ENV_DB, ":memory:")])).unwrap();
        assert_eq!(config.location, DatabaseLocation::Memory);
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = StoreConfig::from_lookup(lookup(&[(ENV_POOL_SIZE, "many")])).unwrap_err();
        assert_eq!(err.variable, ENV_POOL_SIZE);

        let err = StoreConfig::from_lookup(lookup(&[(ENV_ROW_CAP, "0")])).unwrap_err();
        assert_eq!(err.variable, ENV_ROW_CAP);
        assert!(err.to_string().contains("greater than zero"));

        let err = StoreConfig::from_lookup(lookup(&[(ENV_DB, "  ")])).unwrap_err();
        assert_eq!(err.variable, ENV_DB);
    }
}
