//! SSH transport layer.
//!
//! This module defines the native-library seam the authentication logic is
//! written against, the connection configuration, and the russh-backed
//! implementation.

pub mod config;
#[cfg(test)]
pub(crate) mod fake;
pub mod native;
mod ssh;

pub use config::{ConnectionOptions, HostKeyPolicy, TransportConfig};
pub use native::{
    Attempt, AuthMethods, AuthStatus, KbdintPrompt, KbdintRequest, KbdintRound, NativeLibrary,
    NativeSession,
};
pub use ssh::{RusshLibrary, RusshSession};
