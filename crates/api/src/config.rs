//! Process configuration, read once from the environment at start-up.

use std::net::SocketAddr;

use thiserror::Error;

use mercato_core::numbering::DEFAULT_NUMBER_WIDTH;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is required when {reason}")]
    Missing { name: &'static str, reason: &'static str },

    #[error("invalid {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(ConfigError::Invalid {
                name: "STORE_BACKEND",
                message: format!("unknown backend '{other}' (expected memory or postgres)"),
            }),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub number_width: usize,
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("store_backend", &self.store_backend)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("number_width", &self.number_width)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// In-memory configuration with the given secret (tests, local runs).
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: jwt_secret.into(),
            store_backend: StoreBackend::Memory,
            database_url: None,
            number_width: DEFAULT_NUMBER_WIDTH,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `lookup` returns `None` for unset names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                message: e.to_string(),
            })?;

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let store_backend = lookup("STORE_BACKEND")
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or(StoreBackend::Memory);

        let database_url = lookup("DATABASE_URL").filter(|s| !s.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing {
                name: "DATABASE_URL",
                reason: "STORE_BACKEND=postgres",
            });
        }

        let number_width = match lookup("DOCUMENT_NUMBER_WIDTH") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|w| (1..=12).contains(w))
                .ok_or_else(|| ConfigError::Invalid {
                    name: "DOCUMENT_NUMBER_WIDTH",
                    message: format!("'{raw}' is not a width between 1 and 12"),
                })?,
            None => DEFAULT_NUMBER_WIDTH,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            store_backend,
            database_url,
            number_width,
        })
    }
}
