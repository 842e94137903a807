//! Client authentication.
//!
//! Methods are tried in a fixed priority order and the first one the server
//! accepts wins:
//!
//! 1. `none` (some servers grant access outright)
//! 2. public key: the explicit key if one was given, otherwise the agent
//!    and default key locations
//! 3. keyboard-interactive
//! 4. password
//!
//! Methods 2 to 4 are only tried if the server advertises them after the
//! `none` attempt. Nothing is retried.

mod interactive;

use std::fmt;

use log::{debug, info};

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::notice::Notifier;
use crate::transport::{Attempt, AuthMethods, AuthStatus, NativeSession};

/// Prompt passed to the credential for password authentication.
pub const PASSWORD_PROMPT: &str = "Please enter your password";

/// The method that authenticated a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    None,
    PublicKey,
    KeyboardInteractive,
    Password,
}

impl AuthMethod {
    pub fn name(self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::PublicKey => "publickey",
            AuthMethod::KeyboardInteractive => "keyboard-interactive",
            AuthMethod::Password => "password",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Log a non-successful attempt; report whether it succeeded.
fn succeeded(method: &str, attempt: Attempt) -> bool {
    match attempt {
        Ok(AuthStatus::Success) => true,
        Ok(status) => {
            debug!("{} authentication did not succeed: {:?}", method, status);
            false
        }
        Err(e) => {
            debug!("{} authentication failed: {}", method, e);
            false
        }
    }
}

/// Authenticate `session` with the first method that works.
///
/// The session must be connected. Returns the method that succeeded, or
/// [`Error::AuthenticationFailed`] once every advertised method has been
/// tried. Credential failures abort immediately.
pub fn authenticate<S: NativeSession>(
    session: &mut S,
    private_key: Option<&S::PrivateKey>,
    credential: &Credential,
    notifier: &mut dyn Notifier,
) -> Result<AuthMethod> {
    if succeeded("none", session.userauth_none()) {
        info!("Authenticated without credentials");
        return Ok(AuthMethod::None);
    }

    let methods = session.userauth_list();
    debug!("Server accepts {:?}", methods);

    if methods.contains(AuthMethods::PUBLIC_KEY) {
        let attempt = match private_key {
            Some(key) => session.userauth_publickey(key),
            None => session.userauth_publickey_auto(),
        };
        if succeeded("publickey", attempt) {
            info!("Authenticated with public key");
            return Ok(AuthMethod::PublicKey);
        }
    }

    if methods.contains(AuthMethods::KEYBOARD_INTERACTIVE) {
        let attempt = interactive::run(session, credential, notifier)?;
        if succeeded("keyboard-interactive", attempt) {
            info!("Authenticated with keyboard-interactive");
            return Ok(AuthMethod::KeyboardInteractive);
        }
    }

    if methods.contains(AuthMethods::PASSWORD) {
        let password = credential.resolve(PASSWORD_PROMPT)?;
        match session.userauth_password(&password) {
            Ok(AuthStatus::Success) => {
                info!("Authenticated with password");
                return Ok(AuthMethod::Password);
            }
            Ok(status) => debug!("password authentication did not succeed: {:?}", status),
            Err(e) => return Err(Error::auth_failed(format!("failure at 'password auth': {}", e))),
        }
    }

    Err(Error::auth_failed("permission denied"))
}
