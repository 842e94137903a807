//! Connection lifecycle and the owning session handle.
//!
//! [`connect`] runs every step from key import to the issue banner. Once
//! the native session exists it is owned by a [`SessionHandle`], so any
//! error after that point drops the handle and releases the session before
//! the error reaches the caller.

use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use crate::auth::{self, AuthMethod};
use crate::credential::Credential;
use crate::error::{Error, NativeError, Result};
use crate::hostkey::{self, HostFingerprint};
use crate::notice::{Notice, Notifier};
use crate::transport::{ConnectionOptions, HostKeyPolicy, NativeLibrary, NativeSession};

/// An authenticated SSH session.
///
/// The native session is released exactly once: by [`disconnect`] or, if
/// that was never called, when the handle is dropped.
///
/// [`disconnect`]: SessionHandle::disconnect
pub struct SessionHandle<S: NativeSession> {
    session: Option<S>,
    options: ConnectionOptions,
    auth_method: Option<AuthMethod>,
    fingerprint: Option<HostFingerprint>,
}

impl<S: NativeSession> SessionHandle<S> {
    fn new(session: S, options: ConnectionOptions) -> Self {
        Self {
            session: Some(session),
            options,
            auth_method: None,
            fingerprint: None,
        }
    }

    /// Disconnect and release the native session.
    ///
    /// Does nothing if the session is already released.
    pub fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.disconnect();
            session.free();
            if self.auth_method.is_some() {
                info!("Disconnected from {}", self.options.socket_addr());
            } else {
                debug!("Released session for {}", self.options.socket_addr());
            }
        }
    }

    /// Whether the native session is still held.
    pub fn is_alive(&self) -> bool {
        self.session.is_some()
    }

    /// Method that authenticated the session.
    pub fn auth_method(&self) -> Option<AuthMethod> {
        self.auth_method
    }

    /// Server fingerprint observed while connecting.
    pub fn fingerprint(&self) -> Option<&HostFingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// The live native session, for running further primitives.
    pub fn session_mut(&mut self) -> Option<&mut S> {
        self.session.as_mut()
    }
}

impl<S: NativeSession> Drop for SessionHandle<S> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<S: NativeSession> std::fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("options", &self.options)
            .field("alive", &self.is_alive())
            .field("auth_method", &self.auth_method)
            .field("fingerprint", &self.fingerprint.as_ref().map(|fp| fp.to_string()))
            .finish()
    }
}

fn set_option(step: &'static str, result: std::result::Result<(), NativeError>) -> Result<()> {
    result.map_err(|e| Error::Option {
        step,
        message: e.to_string(),
    })
}

/// Connect to `options.host` and authenticate.
///
/// `keyfile`, if given, is imported before anything touches the network and
/// is the only key tried for public key authentication. `credential`
/// answers the key passphrase, keyboard-interactive prompts and the
/// password prompt.
pub fn connect<L: NativeLibrary>(
    library: &L,
    options: ConnectionOptions,
    keyfile: Option<&Path>,
    credential: Credential,
    policy: HostKeyPolicy,
    notifier: &mut dyn Notifier,
) -> Result<SessionHandle<L::Session>> {
    let private_key = match keyfile {
        Some(path) => {
            debug!("Importing private key {}", path.display());
            Some(library.import_private_key(path, &credential)?)
        }
        None => None,
    };

    let session = library.new_session().map_err(|e| Error::NewSession {
        message: e.to_string(),
    })?;
    let mut handle = SessionHandle::new(session, options);
    handle.establish(private_key.as_ref(), credential, policy, notifier)?;
    Ok(handle)
}

impl<S: NativeSession> SessionHandle<S> {
    /// Configure, connect and authenticate the held session.
    ///
    /// On error the caller drops `self`, which releases the session.
    fn establish(
        &mut self,
        private_key: Option<&S::PrivateKey>,
        credential: Credential,
        policy: HostKeyPolicy,
        notifier: &mut dyn Notifier,
    ) -> Result<()> {
        let ConnectionOptions { host, port, user } = &self.options;
        let Some(session) = self.session.as_mut() else {
            return Err(Error::Connect {
                host: host.clone(),
                port: *port,
                message: "session already released".to_string(),
            });
        };

        set_option("set host", session.set_host(host))?;
        set_option("set user", session.set_user(user))?;
        set_option("set port", session.set_port(*port))?;

        let credential = Arc::new(credential);
        session.set_auth_callback(credential.clone());

        debug!("Connecting to {}:{}", host, port);
        session.connect().map_err(|e| Error::Connect {
            host: host.clone(),
            port: *port,
            message: e.to_string(),
        })?;

        let fingerprint = hostkey::verify(session, policy, notifier)?;
        let method = auth::authenticate(session, private_key, &credential, notifier)?;

        if let Some(banner) = session.issue_banner() {
            notifier.notify(Notice::Banner(banner));
        }

        info!("Connected to {}:{} as {} using {}", host, port, user, method);
        self.fingerprint = Some(fingerprint);
        self.auth_method = Some(method);
        Ok(())
    }
}
