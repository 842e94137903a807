//! SSH connection configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Where to connect and as whom.
///
/// Handed to the native session as options, in the order host, user, port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port, 1 to 65535 (default: 22).
    pub port: u16,

    /// Username for authentication.
    pub user: String,
}

impl ConnectionOptions {
    /// Create connection options.
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
        }
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What to do when the server's host key is not in the trust store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Report the fingerprint and continue.
    #[default]
    Advisory,

    /// Fail the connection if the host is not already known.
    RejectUnknown,
}

/// Settings for the russh-backed native library.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout for the TCP connect and key exchange.
    pub timeout: Duration,

    /// Close the connection after this much inactivity.
    pub inactivity_timeout: Option<Duration>,

    /// Path to known_hosts file. `None` uses `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            inactivity_timeout: None,
            known_hosts_path: None,
        }
    }
}
