// src/config.rs

use std::{env, fmt, net::SocketAddr, str::FromStr, time::Duration};

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};

/// Which Persistence Gateway implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// How the correctness flag of a submitted answer is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Trust the `isCorrect` flag sent by the client.
    #[default]
    ClientReported,
    /// Compare `selectedAnswer` against the stored correct answer and
    /// ignore the client flag.
    ServerVerified,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid("STORE_BACKEND", other.to_string())),
        }
    }
}

impl FromStr for ScoringMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client_reported" | "client" => Ok(ScoringMode::ClientReported),
            "server_verified" | "server" => Ok(ScoringMode::ServerVerified),
            other => Err(ConfigError::Invalid("SCORING_MODE", other.to_string())),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid(key, value) => write!(f, "invalid value for {}: '{}'", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Deadline applied to every Persistence Gateway operation.
    pub store_timeout: Duration,
    pub scoring_mode: ScoringMode,
    pub bind_addr: SocketAddr,
    /// Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
    /// JSON seed loaded into the memory backend at startup.
    pub fixture_path: Option<String>,
    pub rust_log: String,
    pub log_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            database_url: None,
            max_connections: 5,
            store_timeout: Duration::from_millis(5000),
            scoring_mode: ScoringMode::ClientReported,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            cors_origins: Vec::new(),
            fixture_path: None,
            rust_log: "info".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the process
    /// environment in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let store_backend = match lookup("STORE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StoreBackend::Postgres,
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let max_connections = parse_or("DB_MAX_CONNECTIONS", &lookup, defaults.max_connections)?;
        let timeout_ms = parse_or(
            "STORE_TIMEOUT_MS",
            &lookup,
            defaults.store_timeout.as_millis() as u64,
        )?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid("STORE_TIMEOUT_MS", "0".to_string()));
        }

        let scoring_mode = match lookup("SCORING_MODE") {
            Some(raw) => raw.parse()?,
            None => defaults.scoring_mode,
        };

        let bind_addr = parse_or("BIND_ADDR", &lookup, defaults.bind_addr)?;

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            store_backend,
            database_url,
            max_connections,
            store_timeout: Duration::from_millis(timeout_ms),
            scoring_mode,
            bind_addr,
            cors_origins,
            fixture_path: lookup("FIXTURE_PATH").filter(|p| !p.trim().is_empty()),
            rust_log: lookup("RUST_LOG").unwrap_or(defaults.rust_log),
            log_dir: lookup("LOG_DIR").unwrap_or(defaults.log_dir),
        })
    }
}

fn parse_or<T, F>(key: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        None => Ok(default),
    }
}
