//! Configuration types.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Service configuration, read from `REGISTER_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Directory for daily rolling log files. Logs go to stderr only when unset.
    pub log_dir: Option<PathBuf>,
    /// Default filter when `RUST_LOG` is not set.
    pub log_level: String,
    /// Sessions not saved for this long are purged.
    pub session_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/register.db"),
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            log_dir: None,
            log_level: "info".to_string(),
            session_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup("REGISTER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let bind_addr = match lookup("REGISTER_BIND_ADDR") {
            Some(raw) => raw.trim().parse::<IpAddr>().map_err(|e| ConfigError::InvalidValue {
                key: "REGISTER_BIND_ADDR".to_string(),
                message: format!("{raw}: {e}"),
            })?,
            None => defaults.bind_addr,
        };

        let port: u16 = lookup("REGISTER_PORT")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.port);

        let log_dir = lookup("REGISTER_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let log_level = lookup("REGISTER_LOG_LEVEL").unwrap_or(defaults.log_level);

        let session_ttl = lookup("REGISTER_SESSION_TTL_MIN")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&minutes| minutes > 0)
            .and_then(|minutes| minutes.checked_mul(60))
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_ttl);

        Ok(Self {
            db_path,
            bind_addr,
            port,
            log_dir,
            log_level,
            session_ttl,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}
