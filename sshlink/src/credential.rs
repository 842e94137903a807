//! Credential sources for passwords, passphrases and interactive answers.
//!
//! A [`Credential`] is either a literal secret or a callback that is asked
//! for an answer given a prompt. The same credential answers every question
//! the connection asks: the key-file passphrase, keyboard-interactive
//! prompts and the password prompt.

use std::fmt;
use std::sync::Arc;

use log::trace;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{CallbackError, Error, Result};

/// Value returned by a credential callback.
///
/// `Ok(None)` means the callback produced no string value (for example the
/// user closed the prompt), which fails the step that asked for it.
pub type CallbackResult = std::result::Result<Option<String>, CallbackError>;

type CallbackFn = dyn Fn(&str) -> CallbackResult + Send + Sync;

/// Source of secrets used during authentication.
pub enum Credential {
    /// A fixed secret returned for every prompt.
    Literal(SecretString),

    /// A callable invoked synchronously with the prompt text.
    Callback(Arc<CallbackFn>),
}

impl Credential {
    /// Create a literal credential.
    pub fn literal(secret: impl Into<String>) -> Self {
        Credential::Literal(SecretString::from(secret.into()))
    }

    /// Create a callback credential.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sshlink::Credential;
    ///
    /// let credential = Credential::callback(|prompt: &str| {
    ///     assert!(!prompt.is_empty());
    ///     Ok(Some("hunter2".to_string()))
    /// });
    /// # let _ = credential;
    /// ```
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&str) -> CallbackResult + Send + Sync + 'static,
    {
        Credential::Callback(Arc::new(f))
    }

    /// Resolve a secret for `prompt`.
    ///
    /// Literal secrets ignore the prompt. Callbacks run on the calling
    /// thread and may block, e.g. while a human types a one-time code.
    pub fn resolve(&self, prompt: &str) -> Result<SecretString> {
        trace!("Resolving credential for prompt {:?}", prompt);

        match self {
            Credential::Literal(secret) if !secret.expose_secret().is_empty() => {
                Ok(SecretString::from(secret.expose_secret().to_owned()))
            }
            Credential::Literal(_) => Err(Error::UnsupportedCredentialType(
                "literal secret is empty".to_string(),
            )),
            Credential::Callback(f) => match f(prompt) {
                Ok(Some(answer)) => Ok(SecretString::from(answer)),
                Ok(None) => Err(Error::Credential {
                    message: "callback did not return a string value".to_string(),
                    source: None,
                }),
                Err(e) => Err(Error::Credential {
                    message: format!("callback failed for prompt {:?}", prompt),
                    source: Some(e),
                }),
            },
        }
    }

    /// Whether this is a callback credential.
    pub fn is_callback(&self) -> bool {
        matches!(self, Credential::Callback(_))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Literal(_) => f.write_str("Credential::Literal([REDACTED])"),
            Credential::Callback(_) => f.write_str("Credential::Callback(..)"),
        }
    }
}

impl From<&str> for Credential {
    fn from(secret: &str) -> Self {
        Credential::literal(secret)
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Credential::literal(secret)
    }
}
