//! Traits over the SSH library that speaks the wire protocol.
//!
//! The authentication logic only decides the order and policy of calling
//! these primitives. Every primitive blocks until the library answers.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;

use crate::credential::Credential;
use crate::error::{NativeError, Result};

/// Outcome of one authentication primitive.
///
/// `Err` is the library-level error (the request could not be carried out),
/// as opposed to the server saying no.
pub type Attempt = std::result::Result<AuthStatus, NativeError>;

/// Server answer to an authentication request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Authenticated.
    Success,
    /// Rejected.
    Denied,
    /// Accepted, but the server wants another method as well.
    Partial,
}

impl AuthStatus {
    /// Whether the user is now authenticated.
    pub fn is_success(self) -> bool {
        self == AuthStatus::Success
    }
}

/// Set of authentication methods advertised by the server.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AuthMethods(u32);

impl AuthMethods {
    pub const NONE: Self = Self(0x01);
    pub const PASSWORD: Self = Self(0x02);
    pub const PUBLIC_KEY: Self = Self(0x04);
    pub const HOST_BASED: Self = Self(0x08);
    pub const KEYBOARD_INTERACTIVE: Self = Self(0x10);

    const NAMED: [(Self, &'static str); 5] = [
        (Self::NONE, "none"),
        (Self::PASSWORD, "password"),
        (Self::PUBLIC_KEY, "publickey"),
        (Self::HOST_BASED, "hostbased"),
        (Self::KEYBOARD_INTERACTIVE, "keyboard-interactive"),
    ];

    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from raw bits, dropping unknown ones.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & 0x1f)
    }

    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every method in `other` is in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Add the methods in `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for AuthMethods {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AuthMethods {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

impl fmt::Debug for AuthMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(method, _)| self.contains(*method))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "AuthMethods({})", names.join(","))
    }
}

/// One prompt of a keyboard-interactive round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KbdintPrompt {
    /// Text shown to the user.
    pub text: String,
    /// Whether the answer may be echoed.
    pub echo: bool,
}

impl KbdintPrompt {
    pub fn new(text: impl Into<String>, echo: bool) -> Self {
        Self {
            text: text.into(),
            echo,
        }
    }
}

/// Information request sent by the server in a keyboard-interactive round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KbdintRequest {
    /// Display name (may be empty).
    pub name: String,
    /// Instruction (may be empty).
    pub instruction: String,
    /// Prompts to answer, in index order. May be empty.
    pub prompts: Vec<KbdintPrompt>,
}

/// Result of one keyboard-interactive challenge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KbdintRound {
    /// The server wants answers; submit them and ask again.
    Info(KbdintRequest),
    /// The exchange is over.
    Done(AuthStatus),
}

/// Factory side of the native SSH library.
pub trait NativeLibrary {
    /// Live session type.
    type Session: NativeSession;

    /// Allocate a new, unconnected session.
    fn new_session(&self) -> std::result::Result<Self::Session, NativeError>;

    /// Parse a private key file.
    ///
    /// `passphrase` is asked for the passphrase if the key is encrypted.
    /// Parse failures are reported as [`crate::Error::KeyFile`]; a failing
    /// passphrase source surfaces its own error.
    fn import_private_key(
        &self,
        path: &Path,
        passphrase: &Credential,
    ) -> Result<<Self::Session as NativeSession>::PrivateKey>;
}

/// One native client session: a socket plus protocol state.
///
/// The session is released by calling [`disconnect`](Self::disconnect) then
/// [`free`](Self::free), exactly once.
pub trait NativeSession {
    /// Parsed private key handle.
    type PrivateKey;

    fn set_host(&mut self, host: &str) -> std::result::Result<(), NativeError>;

    fn set_user(&mut self, user: &str) -> std::result::Result<(), NativeError>;

    fn set_port(&mut self, port: u16) -> std::result::Result<(), NativeError>;

    /// Register the credential consulted when the library itself needs a
    /// secret, e.g. the passphrase of a default key.
    fn set_auth_callback(&mut self, credential: Arc<Credential>);

    /// Open the TCP connection and run the key exchange.
    fn connect(&mut self) -> std::result::Result<(), NativeError>;

    /// Wire-encoded public key of the server.
    fn server_public_key(&mut self) -> std::result::Result<Vec<u8>, NativeError>;

    /// Whether the library's own trust store already knows this server key.
    fn is_server_known(&mut self) -> bool;

    fn userauth_none(&mut self) -> Attempt;

    /// Methods the server advertised in its last authentication failure.
    fn userauth_list(&mut self) -> AuthMethods;

    fn userauth_publickey(&mut self, key: &Self::PrivateKey) -> Attempt;

    /// Try the agent and the default key locations.
    fn userauth_publickey_auto(&mut self) -> Attempt;

    /// Issue a keyboard-interactive challenge request.
    ///
    /// The first call starts the exchange; later calls submit the answers
    /// set since the previous round.
    fn userauth_kbdint(&mut self) -> std::result::Result<KbdintRound, NativeError>;

    /// Set the answer for prompt `index` of the current round.
    fn userauth_kbdint_set_answer(
        &mut self,
        index: usize,
        answer: &SecretString,
    ) -> std::result::Result<(), NativeError>;

    fn userauth_password(&mut self, password: &SecretString) -> Attempt;

    /// Issue banner sent by the server, if any.
    fn issue_banner(&mut self) -> Option<String>;

    /// Close the connection. Errors are not reported.
    fn disconnect(&mut self);

    /// Release the session.
    fn free(self)
    where
        Self: Sized;
}
