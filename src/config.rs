//! Server configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_STORE_PATH: &str = "duskmode-store.json";
pub const DEFAULT_STORE_KEY: &str = "duskmode";
pub const DEFAULT_COORDINATOR_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_PAGE_QUEUE_CAPACITY: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown DUSKMODE_STORE backend '{0}' (expected 'file' or 'memory')")]
    UnknownStore(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    File { path: PathBuf, key: String },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub store: StoreBackend,
    pub coordinator_queue_capacity: usize,
    pub page_queue_capacity: usize,
}

impl ServerConfig {
    /// Build typed server config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DUSKMODE_STORE`: `file` (default) or `memory`
    /// - `DUSKMODE_STORE_PATH`: JSON file for the `file` backend
    /// - `DUSKMODE_STORE_KEY`: record key inside that file
    /// - `COORDINATOR_QUEUE_CAPACITY`: default 256
    /// - `PAGE_QUEUE_CAPACITY`: default 32
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownStore`] for an unrecognized backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        let store = parse_store(
            std::env::var("DUSKMODE_STORE").ok().as_deref(),
            std::env::var("DUSKMODE_STORE_PATH").ok(),
            std::env::var("DUSKMODE_STORE_KEY").ok(),
        )?;

        Ok(Self {
            port: env_parse("PORT", DEFAULT_PORT),
            store,
            coordinator_queue_capacity: env_parse("COORDINATOR_QUEUE_CAPACITY", DEFAULT_COORDINATOR_QUEUE_CAPACITY)
                .max(1),
            page_queue_capacity: env_parse("PAGE_QUEUE_CAPACITY", DEFAULT_PAGE_QUEUE_CAPACITY).max(1),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            store: StoreBackend::File { path: PathBuf::from(DEFAULT_STORE_PATH), key: DEFAULT_STORE_KEY.to_owned() },
            coordinator_queue_capacity: DEFAULT_COORDINATOR_QUEUE_CAPACITY,
            page_queue_capacity: DEFAULT_PAGE_QUEUE_CAPACITY,
        }
    }
}

fn parse_store(raw: Option<&str>, path: Option<String>, key: Option<String>) -> Result<StoreBackend, ConfigError> {
    match raw.unwrap_or("file") {
        "file" => Ok(StoreBackend::File {
            path: PathBuf::from(path.unwrap_or_else(|| DEFAULT_STORE_PATH.to_owned())),
            key: key.unwrap_or_else(|| DEFAULT_STORE_KEY.to_owned()),
        }),
        "memory" => Ok(StoreBackend::Memory),
        other => Err(ConfigError::UnknownStore(other.to_owned())),
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
