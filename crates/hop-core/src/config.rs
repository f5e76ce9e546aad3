//! hopgate.toml configuration parser.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_BIND: &str = "0.0.0.0:9000";

/// Daemon configuration. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Listener address for both CONNECT and control traffic.
    pub bind: SocketAddr,
    /// Serve the rule management API on non-CONNECT requests.
    pub control_api: bool,
    /// Upper bound on backend dial time. Unset means no deadline.
    pub dial_timeout_secs: Option<u64>,
    /// Rule files loaded at startup, before any given on the command line.
    pub rules: Vec<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.parse().expect("default bind address"),
            control_api: true,
            dial_timeout_secs: None,
            rules: Vec::new(),
        }
    }
}

impl GatewayConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn dial_timeout(&self) -> Option<Duration> {
        self.dial_timeout_secs.map(Duration::from_secs)
    }
}
