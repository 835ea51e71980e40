//! Relay configuration
//!
//! A [`RelayConfig`] is fixed for the lifetime of one relay instance. The
//! embedding application picks the target from its own server table and
//! hands it over at construction time.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Loopback port the Flash client is pointed at by convention
pub const DEFAULT_LISTEN_PORT: u16 = 8181;
pub const DEFAULT_TARGET_HOST: &str = "socket.aq.com";
pub const DEFAULT_TARGET_PORT: u16 = 5588;

/// Where to listen and where to forward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Port on `127.0.0.1`. Zero lets the OS choose.
    pub listen_port: u16,
    pub target_host: String,
    pub target_port: u16,
}

impl RelayConfig {
    /// Build a validated config
    pub fn new(
        listen_port: u16,
        target_host: impl Into<String>,
        target_port: u16,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            listen_port,
            target_host: target_host.into(),
            target_port,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build a config from a combined `host:port` target
    ///
    /// IPv6 literals may be bracketed: `[::1]:5588`.
    pub fn with_target(listen_port: u16, target: &str) -> Result<Self, ConfigError> {
        let (host, port) = parse_target(target)?;
        Self::new(listen_port, host, port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_host.trim().is_empty() {
            return Err(ConfigError::EmptyTargetHost);
        }
        if self.target_port == 0 {
            return Err(ConfigError::ZeroTargetPort);
        }
        Ok(())
    }

    /// Address the listener binds to
    pub fn listen_addr(&self) -> String {
        format!("127.0.0.1:{}", self.listen_port)
    }

    /// Upstream address in the form accepted by `TcpStream::connect`
    pub fn target_addr(&self) -> String {
        if self.target_host.contains(':') {
            format!("[{}]:{}", self.target_host, self.target_port)
        } else {
            format!("{}:{}", self.target_host, self.target_port)
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            target_host: DEFAULT_TARGET_HOST.to_string(),
            target_port: DEFAULT_TARGET_PORT,
        }
    }
}

/// Split `host:port` into its parts
pub fn parse_target(target: &str) -> Result<(String, u16), ConfigError> {
    let invalid = || ConfigError::InvalidTarget(target.to_string());

    let (host, port) = target.trim().rsplit_once(':').ok_or_else(invalid)?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    let port: u16 = port.parse().map_err(|_| invalid())?;

    if host.is_empty() {
        return Err(ConfigError::EmptyTargetHost);
    }

    Ok((host.to_string(), port))
}
