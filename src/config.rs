//! Client configuration read from the environment

use anyhow::{bail, Result};
use std::time::Duration;
use vehicle_shared::{defaults, Role};

/// Configuration for the control client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Control server address
    pub server: String,
    pub role: Role,
    /// Admin secret, ignored for observers
    pub password: String,
    /// Local telemetry port (0 = ephemeral)
    pub udp_port: u16,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:5555".into(),
            role: Role::Observer,
            password: defaults::ADMIN_SECRET.into(),
            udp_port: 0,
            connect_timeout: Duration::from_secs(6),
        }
    }
}

impl ClientConfig {
    /// Read `VEHICLE_SERVER`, `VEHICLE_ROLE`, `VEHICLE_PASSWORD`, `VEHICLE_UDP_PORT`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(server) = lookup("VEHICLE_SERVER") {
            config.server = server;
        }
        if let Some(role) = lookup("VEHICLE_ROLE") {
            config.role = match role.to_ascii_uppercase().as_str() {
                "ADMIN" => Role::Admin,
                "OBSERVER" => Role::Observer,
                other => bail!("Unknown role: {}", other),
            };
        }
        if let Some(password) = lookup("VEHICLE_PASSWORD") {
            config.password = password;
        }
        if let Some(port) = lookup("VEHICLE_UDP_PORT") {
            config.udp_port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid VEHICLE_UDP_PORT: {}", port))?;
        }

        Ok(config)
    }
}
