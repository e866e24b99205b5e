//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::SupplierId;
use thiserror::Error;

/// A configuration value that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// A supplier hosted by another server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSupplierConfig {
    pub supplier_id: SupplierId,
    pub base_url: String,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `ORCHESTRATOR_ID`: id stamped on orchestrator audit records (default: `0`)
/// - `WORKER_POOL_SIZE`: workflows executing at once (default: `10`)
/// - `SUPPLIER_IDS`: comma-separated ids of the ledgers hosted in this process
///   (default: `"0,1"`)
/// - `REMOTE_SUPPLIERS`: comma-separated `id=url` pairs of suppliers hosted
///   elsewhere (default: none)
/// - `REMOTE_TIMEOUT_SECS`: request timeout for remote suppliers (default: `30`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub orchestrator_id: i64,
    pub pool_size: usize,
    pub local_suppliers: Vec<SupplierId>,
    pub remote_suppliers: Vec<RemoteSupplierConfig>,
    pub remote_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    ///
    /// Unparsable numbers fall back to their default; malformed supplier
    /// lists are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            orchestrator_id: env_parse("ORCHESTRATOR_ID").unwrap_or(defaults.orchestrator_id),
            pool_size: env_parse("WORKER_POOL_SIZE").unwrap_or(defaults.pool_size),
            local_suppliers: match std::env::var("SUPPLIER_IDS") {
                Ok(raw) => parse_supplier_ids(&raw)?,
                Err(_) => defaults.local_suppliers,
            },
            remote_suppliers: match std::env::var("REMOTE_SUPPLIERS") {
                Ok(raw) => parse_remote_suppliers(&raw)?,
                Err(_) => defaults.remote_suppliers,
            },
            remote_timeout: env_parse("REMOTE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.remote_timeout),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            orchestrator_id: 0,
            pool_size: 10,
            local_suppliers: vec![SupplierId::new(0), SupplierId::new(1)],
            remote_suppliers: Vec::new(),
            remote_timeout: Duration::from_secs(30),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_id(var: &'static str, raw: &str) -> Result<SupplierId, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .map(SupplierId::new)
        .map_err(|e| ConfigError::Invalid {
            var,
            reason: format!("{raw:?} is not a supplier id: {e}"),
        })
}

/// Parses `"0, 1,2"` into supplier ids. Empty entries are skipped.
pub fn parse_supplier_ids(raw: &str) -> Result<Vec<SupplierId>, ConfigError> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| parse_id("SUPPLIER_IDS", entry))
        .collect()
}

/// Parses `"2=http://host:3001,3=http://host:3002"`.
pub fn parse_remote_suppliers(raw: &str) -> Result<Vec<RemoteSupplierConfig>, ConfigError> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let (id, url) = entry.split_once('=').ok_or_else(|| ConfigError::Invalid {
                var: "REMOTE_SUPPLIERS",
                reason: format!("{entry:?} is not of the form id=url"),
            })?;
            let base_url = url.trim();
            if base_url.is_empty() {
                return Err(ConfigError::Invalid {
                    var: "REMOTE_SUPPLIERS",
                    reason: format!("{entry:?} has an empty url"),
                });
            }
            Ok(RemoteSupplierConfig {
                supplier_id: parse_id("REMOTE_SUPPLIERS", id)?,
                base_url: base_url.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.pool_size, 10);
        assert_eq!(
            config.local_suppliers,
            vec![SupplierId::new(0), SupplierId::new(1)]
        );
        assert!(config.remote_suppliers.is_empty());
        assert_eq!(config.remote_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_supplier_ids() {
        assert_eq!(
            parse_supplier_ids(" 3, 1,,7 ").unwrap(),
            vec![SupplierId::new(3), SupplierId::new(1), SupplierId::new(7)]
        );
        assert!(parse_supplier_ids("").unwrap().is_empty());
        assert!(matches!(
            parse_supplier_ids("1,two"),
            Err(ConfigError::Invalid { var: "SUPPLIER_IDS", .. })
        ));
    }

    #[test]
    fn test_parse_remote_suppliers() {
        assert_eq!(
            parse_remote_suppliers("2=http://10.0.0.5:3000, 4 = http://other:3000/").unwrap(),
            vec![
                RemoteSupplierConfig {
                    supplier_id: SupplierId::new(2),
                    base_url: "http://10.0.0.5:3000".to_string(),
                },
                RemoteSupplierConfig {
                    supplier_id: SupplierId::new(4),
                    base_url: "http://other:3000/".to_string(),
                },
            ]
        );
        assert!(parse_remote_suppliers("2:http://x").is_err());
        assert!(parse_remote_suppliers("2=").is_err());
        assert!(parse_remote_suppliers("x=http://y").is_err());
    }
}
