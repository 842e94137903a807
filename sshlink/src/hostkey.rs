//! Server host key fingerprinting and trust check.
//!
//! Fingerprints are SHA-256 over the wire-encoded key blob, rendered the way
//! OpenSSH prints them (`SHA256:<base64>`). Older tooling showed a colon
//! separated SHA-1 hex string; [`HostFingerprint::to_hex`] gives the same
//! layout for the SHA-256 digest. Only the display differs, trust decisions
//! come from the native library's trust store.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD as BASE64};
use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::notice::{Notice, Notifier};
use crate::transport::{HostKeyPolicy, NativeSession};

/// Digest of the server's public key plus its trust status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFingerprint {
    hash: Vec<u8>,
    known: bool,
}

impl HostFingerprint {
    /// Digest algorithm name.
    pub const ALGORITHM: &'static str = "SHA256";

    /// Fingerprint a wire-encoded public key.
    pub fn from_key_blob(blob: &[u8], known: bool) -> Self {
        Self {
            hash: Sha256::digest(blob).to_vec(),
            known,
        }
    }

    /// Raw digest bytes.
    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    /// Whether the host is already in the trust store.
    pub fn is_known(&self) -> bool {
        self.known
    }

    /// Colon separated lowercase hex, e.g. `4f:a1:...`.
    pub fn to_hex(&self) -> String {
        self.hash
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for HostFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", Self::ALGORITHM, BASE64.encode(&self.hash))
    }
}

/// Fetch the server key and compute its fingerprint.
///
/// Failing to retrieve the key is fatal to the connection attempt.
pub fn fingerprint<S: NativeSession>(session: &mut S) -> Result<HostFingerprint> {
    let blob = session
        .server_public_key()
        .map_err(|e| Error::HostKey(format!("failed to retrieve server public key: {}", e)))?;
    let known = session.is_server_known();
    Ok(HostFingerprint::from_key_blob(&blob, known))
}

/// Fingerprint the server and apply `policy`.
///
/// An unknown host is always reported to `notifier`. Under
/// [`HostKeyPolicy::Advisory`] the connection continues regardless.
pub fn verify<S: NativeSession>(
    session: &mut S,
    policy: HostKeyPolicy,
    notifier: &mut dyn Notifier,
) -> Result<HostFingerprint> {
    let fingerprint = fingerprint(session)?;

    if fingerprint.is_known() {
        debug!("Server host key is known: {}", fingerprint);
        return Ok(fingerprint);
    }

    notifier.notify(Notice::UnknownHost {
        fingerprint: fingerprint.to_string(),
    });

    match policy {
        HostKeyPolicy::Advisory => Ok(fingerprint),
        HostKeyPolicy::RejectUnknown => {
            warn!("Rejecting unknown host key {}", fingerprint);
            Err(Error::HostKey(format!(
                "server is not in the trust store (fingerprint {})",
                fingerprint
            )))
        }
    }
}
