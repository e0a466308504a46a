//! Server configuration for Keyhold.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `KEYHOLD_*` environment variables.

use std::net::SocketAddr;

const DEFAULT_PORT: u16 = 8300;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Storage backend type.
    pub storage_backend: StorageBackendType,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// API key registered for the bootstrap user at startup.
    pub root_api_key: Option<String>,
    /// Email of the bootstrap user.
    pub root_email: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("storage_backend", &self.storage_backend)
            .field("log_level", &self.log_level)
            .field("root_api_key", &self.root_api_key.as_ref().map(|_| "[redacted]"))
            .field("root_email", &self.root_email)
            .finish()
    }
}

/// Supported storage backend types.
#[derive(Clone, PartialEq, Eq)]
pub enum StorageBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// `RocksDB` persistent storage.
    RocksDb { path: String },
    /// PostgreSQL persistent storage.
    Postgres { url: String },
}

impl std::fmt::Debug for StorageBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::RocksDb { path } => f.debug_struct("RocksDb").field("path", path).finish(),
            // The URL may carry credentials.
            Self::Postgres { .. } => f.debug_struct("Postgres").finish_non_exhaustive(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT` — port to bind on, binds to `0.0.0.0`
    /// - `KEYHOLD_BIND_ADDR` — full bind address (overrides `PORT`, default: `127.0.0.1:8300`)
    /// - `KEYHOLD_STORAGE` — `memory`, `rocksdb`, or `postgres` (default: `memory`)
    /// - `KEYHOLD_STORAGE_PATH` — path for the `RocksDB` backend (default: `./data`)
    /// - `DATABASE_URL` — PostgreSQL connection string (used when `KEYHOLD_STORAGE=postgres`)
    /// - `KEYHOLD_LOG_LEVEL` — log filter (default: `info`)
    /// - `KEYHOLD_ROOT_API_KEY` — API key to register at startup (optional)
    /// - `KEYHOLD_ROOT_EMAIL` — email of the bootstrap user (default: `admin@localhost`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        // Priority: KEYHOLD_BIND_ADDR > PORT > default.
        let default_addr = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT));
        let bind_addr = if let Some(addr) = var("KEYHOLD_BIND_ADDR") {
            addr.parse().unwrap_or(default_addr)
        } else if let Some(port) = var("PORT") {
            SocketAddr::from(([0, 0, 0, 0], port.parse().unwrap_or(DEFAULT_PORT)))
        } else {
            default_addr
        };

        let storage_path = var("KEYHOLD_STORAGE_PATH").unwrap_or_else(|| "./data".to_owned());

        let storage_backend = match var("KEYHOLD_STORAGE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "rocksdb" => StorageBackendType::RocksDb { path: storage_path },
            "postgres" | "postgresql" => StorageBackendType::Postgres {
                url: var("DATABASE_URL")
                    .unwrap_or_else(|| "postgres://localhost/keyhold".to_owned()),
            },
            _ => StorageBackendType::Memory,
        };

        Self {
            bind_addr,
            storage_backend,
            log_level: var("KEYHOLD_LOG_LEVEL").unwrap_or_else(|| "info".to_owned()),
            root_api_key: var("KEYHOLD_ROOT_API_KEY").filter(|k| !k.is_empty()),
            root_email: var("KEYHOLD_ROOT_EMAIL")
                .unwrap_or_else(|| "admin@localhost".to_owned()),
        }
    }
}
