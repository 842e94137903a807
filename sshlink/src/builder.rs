//! Builder for opening sessions.

use std::path::PathBuf;
use std::time::Duration;

use crate::credential::{CallbackResult, Credential};
use crate::error::{Error, Result};
use crate::notice::{LogNotifier, Notifier};
use crate::session::{self, SessionHandle};
use crate::transport::{
    ConnectionOptions, HostKeyPolicy, NativeLibrary, RusshLibrary, RusshSession, TransportConfig,
};

/// Builder for connecting and authenticating a session.
///
/// # Example
///
/// ```rust,no_run
/// use sshlink::SessionBuilder;
///
/// # fn example() -> Result<(), sshlink::Error> {
/// let mut session = SessionBuilder::new("192.168.1.1")
///     .user("admin")
///     .password("secret")
///     .connect()?;
///
/// println!("authenticated with {:?}", session.auth_method());
/// session.disconnect();
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    port: u16,
    user: Option<String>,
    private_key: Option<PathBuf>,
    credential: Option<Credential>,
    policy: HostKeyPolicy,
    notifier: Box<dyn Notifier>,
    config: TransportConfig,
}

impl SessionBuilder {
    /// Create a new session builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: None,
            private_key: None,
            credential: None,
            policy: HostKeyPolicy::default(),
            notifier: Box::new(LogNotifier),
            config: TransportConfig::default(),
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Use this private key file for public key authentication.
    ///
    /// Without one, the agent and the default key locations are tried.
    pub fn private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key = Some(path.into());
        self
    }

    /// Answer every prompt with a fixed secret.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.credential = Some(Credential::literal(password));
        self
    }

    /// Set the credential source.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Ask `f` for each passphrase, interactive answer and password.
    pub fn credential_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> CallbackResult + Send + Sync + 'static,
    {
        self.credential = Some(Credential::callback(f));
        self
    }

    /// Set what happens when the host key is unknown (default: advisory).
    pub fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Send notices here instead of the log.
    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Close the connection after this much inactivity.
    pub fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.config.inactivity_timeout = Some(timeout);
        self
    }

    /// Check host keys against this known_hosts file.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.known_hosts_path = Some(path.into());
        self
    }

    /// Connect using the russh backend.
    pub fn connect(self) -> Result<SessionHandle<RusshSession>> {
        let library = RusshLibrary::new(self.config.clone());
        self.connect_with(&library)
    }

    /// Connect using `library`.
    ///
    /// Transport settings on this builder only apply to [`connect`](Self::connect).
    pub fn connect_with<L: NativeLibrary>(mut self, library: &L) -> Result<SessionHandle<L::Session>> {
        let user = self.user.take().ok_or_else(|| Error::InvalidConfig {
            message: "User is required".to_string(),
        })?;
        if self.host.is_empty() {
            return Err(Error::InvalidConfig {
                message: "Host must not be empty".to_string(),
            });
        }

        let options = ConnectionOptions::new(self.host, self.port, user);
        let credential = self.credential.unwrap_or_else(|| Credential::literal(""));

        session::connect(
            library,
            options,
            self.private_key.as_deref(),
            credential,
            self.policy,
            &mut *self.notifier,
        )
    }
}
