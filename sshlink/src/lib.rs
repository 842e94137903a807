//! # sshlink
//!
//! Blocking SSH client connection and authentication.
//!
//! sshlink opens an SSH connection, checks the server's host key and
//! authenticates by falling back through the methods the server offers,
//! handing back a single [`SessionHandle`] that owns the native session.
//!
//! ## Features
//!
//! - Fixed method order: none, public key, keyboard-interactive, password
//! - Literal or callback credentials for passphrases, prompts and passwords
//! - SHA-256 host key fingerprints with an opt-in strict trust policy
//! - Native session released exactly once, on every error path or on drop
//! - russh backend behind a small native-library trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sshlink::SessionBuilder;
//!
//! fn main() -> Result<(), sshlink::Error> {
//!     let mut session = SessionBuilder::new("192.168.1.1")
//!         .user("admin")
//!         .credential_callback(|prompt: &str| {
//!             eprintln!("{}", prompt);
//!             Ok(Some("secret".to_string()))
//!         })
//!         .connect()?;
//!
//!     if let Some(fingerprint) = session.fingerprint() {
//!         println!("server key {}", fingerprint);
//!     }
//!
//!     session.disconnect();
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod builder;
pub mod credential;
pub mod error;
pub mod hostkey;
pub mod notice;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use auth::{AuthMethod, authenticate};
pub use builder::SessionBuilder;
pub use credential::{CallbackResult, Credential};
pub use error::{CallbackError, Error, NativeError, Result};
pub use hostkey::HostFingerprint;
pub use notice::{LogNotifier, Notice, Notifier};
pub use session::{SessionHandle, connect};
pub use transport::{ConnectionOptions, HostKeyPolicy, RusshLibrary, RusshSession, TransportConfig};
