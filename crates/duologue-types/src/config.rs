//! Global configuration types for Duologue.
//!
//! `GlobalConfig` represents the top-level `config.toml` that selects the
//! document store backend and the API server address.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Top-level configuration. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Which document store implementation backs the chat core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Durable SQLite database in the data directory.
    #[default]
    Sqlite,
    /// Process-local store; everything is lost on exit.
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Sqlite => write!(f, "sqlite"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Change-buffer size per live query. Subscribers that fall further behind
    /// than this receive a subscription error.
    #[serde(default = "default_subscription_capacity")]
    pub subscription_capacity: usize,
}

fn default_subscription_capacity() -> usize {
    256
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            subscription_capacity: default_subscription_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.subscription_capacity, 256);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_global_config_deserialize_with_defaults() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_global_config_deserialize_with_values() {
        let toml_str = r#"
[store]
backend = "memory"
subscription_capacity = 32

[server]
host = "0.0.0.0"
port = 8080
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.subscription_capacity, 32);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_partial_section_keeps_field_defaults() {
        let config: GlobalConfig = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.store.subscription_capacity, 256);
    }

    #[test]
    fn test_store_backend_display() {
        assert_eq!(StoreBackend::Sqlite.to_string(), "sqlite");
        assert_eq!(StoreBackend::Memory.to_string(), "memory");
    }
}
