//! Runtime configuration
//!
//! Values come from `SHELFSYNC_*` environment variables with built-in
//! defaults; front ends may override individual fields afterwards.

use crate::error::ShelfError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://openlibrary.org";
pub const DEFAULT_COVERS_URL: &str = "https://covers.openlibrary.org";
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Which persistence engine to use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// SQLite when it can be opened, otherwise the key-value store
    #[default]
    Auto,
    Sqlite,
    #[serde(rename = "kv")]
    KeyValue,
}

impl FromStr for BackendChoice {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendChoice::Auto),
            "sqlite" => Ok(BackendChoice::Sqlite),
            "kv" | "key-value" => Ok(BackendChoice::KeyValue),
            other => Err(ShelfError::Config(format!(
                "unknown backend '{}' (expected auto, sqlite or kv)",
                other
            ))),
        }
    }
}

/// Settings shared by the storage, remote and sync layers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Directory holding the SQLite database or the key-value documents
    pub data_dir: PathBuf,

    pub backend: BackendChoice,

    pub api_base_url: String,

    pub covers_base_url: String,

    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Remote and cached page size
    pub page_size: u32,

    /// Cap on offline search results
    pub search_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: BackendChoice::Auto,
            api_base_url: DEFAULT_API_URL.to_string(),
            covers_base_url: DEFAULT_COVERS_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "shelfsync", "shelfsync")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./shelfsync_data"))
}

impl Settings {
    /// Defaults overridden by `SHELFSYNC_*` environment variables
    pub fn from_env() -> Result<Self, ShelfError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable name
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ShelfError> {
        let mut settings = Self::default();

        if let Some(dir) = lookup("SHELFSYNC_DATA_DIR") {
            settings.data_dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup("SHELFSYNC_BACKEND") {
            settings.backend = backend.parse()?;
        }
        if let Some(url) = lookup("SHELFSYNC_API_URL") {
            settings.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = lookup("SHELFSYNC_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ShelfError::Config(format!("SHELFSYNC_TIMEOUT_SECS is not a number: '{}'", secs))
            })?;
            settings.request_timeout = Duration::from_secs(secs);
        }
        if let Some(size) = lookup("SHELFSYNC_PAGE_SIZE") {
            settings.page_size = size.trim().parse().map_err(|_| {
                ShelfError::Config(format!("SHELFSYNC_PAGE_SIZE is not a number: '{}'", size))
            })?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the sync layer cannot work with
    pub fn validate(&self) -> Result<(), ShelfError> {
        if self.page_size == 0 {
            return Err(ShelfError::Config("page size must be at least 1".into()));
        }
        if self.search_limit == 0 {
            return Err(ShelfError::Config("search limit must be at least 1".into()));
        }
        Ok(())
    }

    /// SQLite database file inside the data directory
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("shelfsync.db")
    }

    /// Root of the key-value documents inside the data directory
    pub fn kv_path(&self) -> PathBuf {
        self.data_dir.join("kv")
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.backend, BackendChoice::Auto);
        assert_eq!(settings.page_size, 20);
        assert_eq!(settings.api_base_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("SHELFSYNC_DATA_DIR", "/tmp/shelf"),
            ("SHELFSYNC_BACKEND", "KV"),
            ("SHELFSYNC_API_URL", "http://localhost:8080/"),
            ("SHELFSYNC_TIMEOUT_SECS", "3"),
            ("SHELFSYNC_PAGE_SIZE", "50"),
        ]))
        .unwrap();

        assert_eq!(settings.data_dir, PathBuf::from("/tmp/shelf"));
        assert_eq!(settings.backend, BackendChoice::KeyValue);
        assert_eq!(settings.api_base_url, "http://localhost:8080");
        assert_eq!(settings.request_timeout, Duration::from_secs(3));
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.database_path(), PathBuf::from("/tmp/shelf/shelfsync.db"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Settings::from_lookup(lookup(&[("SHELFSYNC_BACKEND", "postgres")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("SHELFSYNC_PAGE_SIZE", "0")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("SHELFSYNC_TIMEOUT_SECS", "soon")])).is_err());
    }
}
