//! Error types for sshlink.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by user-supplied credential callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for sshlink operations.
///
/// Every variant that is raised after the native session exists is raised
/// only once that session has been disconnected and freed.
#[derive(Error, Debug)]
pub enum Error {
    /// Setting a connection option on the native session failed.
    #[error("failure at '{step}': {message}")]
    Option {
        /// Step name, e.g. `set host`.
        step: &'static str,
        message: String,
    },

    /// The native library could not allocate a session.
    #[error("failure at 'new session': {message}")]
    NewSession { message: String },

    /// The transport-level connect failed.
    #[error("failure at 'connect' to {host}:{port}: {message}")]
    Connect {
        host: String,
        port: u16,
        message: String,
    },

    /// The private key file could not be parsed.
    #[error("Failed to read private key {}: {message}", path.display())]
    KeyFile { path: PathBuf, message: String },

    /// A callback credential source failed to produce a usable secret.
    #[error("Credential error: {message}")]
    Credential {
        message: String,
        #[source]
        source: Option<CallbackError>,
    },

    /// The credential has no usable form.
    #[error("Unsupported credential type: {0}")]
    UnsupportedCredentialType(String),

    /// No authentication method succeeded, or a fatal auth primitive failed.
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// The remote host key could not be retrieved or was rejected by policy.
    #[error("Host key error: {0}")]
    HostKey(String),

    /// Invalid configuration in the session builder.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl Error {
    pub(crate) fn auth_failed(reason: impl Into<String>) -> Self {
        Error::AuthenticationFailed {
            reason: reason.into(),
        }
    }
}

/// Diagnostic reported by the native SSH library for a failed primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct NativeError {
    message: String,
}

impl NativeError {
    /// Create a native error carrying the library's diagnostic text.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The diagnostic text.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<russh::Error> for NativeError {
    fn from(err: russh::Error) -> Self {
        NativeError::new(err.to_string())
    }
}

/// Result type alias using sshlink's Error.
pub type Result<T> = std::result::Result<T, Error>;
