//! Server configuration
//!
//! Loaded from a TOML file; every field is optional and falls back to the
//! shared defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use vehicle_shared::defaults;

/// Largest accepted `max_sessions`; the registry preallocates every slot
pub const MAX_SESSIONS_LIMIT: usize = 4096;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Configuration for the control server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP address the control listener binds to
    pub listen_addr: String,
    /// Password required by `ADMIN` handshakes
    pub admin_secret: String,
    /// Upper bound on concurrently registered sessions
    pub max_sessions: usize,
    /// Seconds between telemetry broadcasts
    pub telemetry_interval_secs: u64,
    /// Datagram port for sessions that did not announce one
    pub fallback_udp_port: u16,
    /// Session event log appended to in addition to tracing output
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: defaults::LISTEN_ADDR.into(),
            admin_secret: defaults::ADMIN_SECRET.into(),
            max_sessions: defaults::MAX_SESSIONS,
            telemetry_interval_secs: defaults::TELEMETRY_INTERVAL_SECS,
            fallback_udp_port: defaults::FALLBACK_UDP_PORT,
            log_file: None,
        }
    }
}

impl ServerConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions == 0 || self.max_sessions > MAX_SESSIONS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_sessions must be between 1 and {}",
                MAX_SESSIONS_LIMIT
            )));
        }
        if self.fallback_udp_port == 0 {
            return Err(ConfigError::Invalid(
                "fallback_udp_port must be a non-zero port".into(),
            ));
        }
        if self.telemetry_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "telemetry_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_secs(self.telemetry_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:5555");
        assert_eq!(config.admin_secret, "admin123");
        assert_eq!(config.max_sessions, 50);
        assert_eq!(config.telemetry_interval(), Duration::from_secs(10));
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            admin_secret = "hunter2"
            max_sessions = 4
            "#,
        )
        .expect("valid config");
        assert_eq!(config.admin_secret, "hunter2");
        assert_eq!(config.max_sessions, 4);
        assert_eq!(config.fallback_udp_port, defaults::FALLBACK_UDP_PORT);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let result = ServerConfig::from_toml("max_sessions = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_oversized_capacity() {
        let result = ServerConfig::from_toml("max_sessions = 1000000000000");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        let at_limit = format!("max_sessions = {}", MAX_SESSIONS_LIMIT);
        assert!(ServerConfig::from_toml(&at_limit).is_ok());
    }

    #[test]
    fn test_rejects_zero_fallback_port() {
        let result = ServerConfig::from_toml("fallback_udp_port = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let result = ServerConfig::from_toml("telemetry_interval_secs = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "listen_addr = \"127.0.0.1:7000\"").expect("write");
        writeln!(file, "log_file = \"/tmp/vehicle.log\"").expect("write");

        let config = ServerConfig::load(file.path()).expect("valid config");
        assert_eq!(config.listen_addr, "127.0.0.1:7000");
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/vehicle.log")));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ServerConfig::load("/nonexistent/vehicle-server.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
