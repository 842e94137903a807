//! Native session implementation using russh.
//!
//! russh is async; every primitive here drives it to completion on a
//! current-thread runtime owned by the session, so callers see plain
//! blocking calls.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use russh::client::{self, AuthResult, Handle, KeyboardInteractiveAuthResponse};
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg, PublicKey, PublicKeyBase64, load_secret_key};
use russh::{Disconnect, MethodKind, MethodSet};
use secrecy::{ExposeSecret, SecretString};
use tokio::runtime::{Builder, Runtime};

use super::config::TransportConfig;
use super::native::{
    Attempt, AuthMethods, AuthStatus, KbdintPrompt, KbdintRequest, KbdintRound, NativeLibrary,
    NativeSession,
};
use crate::credential::Credential;
use crate::error::{Error, NativeError, Result};

/// Key files tried by automatic public key authentication, in order.
const DEFAULT_KEY_NAMES: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

/// russh-backed native library.
#[derive(Debug, Clone, Default)]
pub struct RusshLibrary {
    config: TransportConfig,
}

impl RusshLibrary {
    /// Create a library with the given transport settings.
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

impl NativeLibrary for RusshLibrary {
    type Session = RusshSession;

    fn new_session(&self) -> std::result::Result<RusshSession, NativeError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NativeError::new(format!("failed to start runtime: {}", e)))?;

        Ok(RusshSession {
            handle: None,
            runtime,
            config: self.config.clone(),
            host: None,
            user: None,
            port: 22,
            credential: None,
            state: Arc::new(Mutex::new(HandlerState::default())),
            methods: AuthMethods::empty(),
            kbdint_answers: None,
        })
    }

    fn import_private_key(&self, path: &Path, passphrase: &Credential) -> Result<Arc<PrivateKey>> {
        load_key(path, passphrase).map(Arc::new)
    }
}

/// Load a private key, asking `credential` for the passphrase if it is encrypted.
fn load_key(path: &Path, credential: &Credential) -> Result<PrivateKey> {
    let key_file_error = |e: russh::keys::Error| Error::KeyFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    match load_secret_key(path, None) {
        Ok(key) => Ok(key),
        Err(russh::keys::Error::KeyIsEncrypted) => {
            let prompt = format!("Enter passphrase for key '{}': ", path.display());
            let passphrase = credential.resolve(&prompt)?;
            load_secret_key(path, Some(passphrase.expose_secret())).map_err(key_file_error)
        }
        Err(e) => Err(key_file_error(e)),
    }
}

fn not_connected() -> NativeError {
    NativeError::new("session is not connected")
}

/// State written by the russh handler while the connection runs.
#[derive(Default)]
struct HandlerState {
    server_key: Option<PublicKey>,
    banner: Option<String>,
}

/// One russh client connection driven synchronously.
pub struct RusshSession {
    handle: Option<Handle<SshHandler>>,
    runtime: Runtime,
    config: TransportConfig,
    host: Option<String>,
    user: Option<String>,
    port: u16,
    credential: Option<Arc<Credential>>,
    state: Arc<Mutex<HandlerState>>,
    /// Methods from the last authentication failure.
    methods: AuthMethods,
    /// Answers for the keyboard-interactive round in progress.
    kbdint_answers: Option<Vec<String>>,
}

impl RusshSession {
    fn state(&self) -> MutexGuard<'_, HandlerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn user(&self) -> std::result::Result<String, NativeError> {
        self.user
            .clone()
            .ok_or_else(|| NativeError::new("user option is not set"))
    }

    /// Translate an auth result, remembering the advertised methods.
    fn record(&mut self, result: AuthResult) -> AuthStatus {
        match result {
            AuthResult::Success => AuthStatus::Success,
            AuthResult::Failure {
                remaining_methods,
                partial_success,
            } => self.record_failure(&remaining_methods, partial_success),
        }
    }

    fn record_failure(&mut self, remaining: &MethodSet, partial_success: bool) -> AuthStatus {
        self.methods = methods_from(remaining);
        if partial_success {
            AuthStatus::Partial
        } else {
            AuthStatus::Denied
        }
    }

    #[cfg(unix)]
    fn agent_auth(&mut self) -> std::result::Result<bool, NativeError> {
        use russh::keys::agent::client::AgentClient;

        let user = self.user()?;
        let handle = self.handle.as_mut().ok_or_else(not_connected)?;

        self.runtime.block_on(async {
            let mut agent = match AgentClient::connect_env().await {
                Ok(agent) => agent,
                Err(e) => {
                    debug!("SSH agent not available: {}", e);
                    return Ok(false);
                }
            };

            let keys = match agent.request_identities().await {
                Ok(keys) => keys,
                Err(e) => {
                    debug!("Failed to list agent keys: {}", e);
                    return Ok(false);
                }
            };

            for key in keys {
                match handle
                    .authenticate_publickey_with(&user, key, None, &mut agent)
                    .await
                {
                    Ok(result) if result.success() => return Ok(true),
                    Ok(_) => debug!("Agent key rejected by server"),
                    Err(e) => debug!("Agent signing failed: {}", e),
                }
            }
            Ok(false)
        })
    }

    #[cfg(not(unix))]
    fn agent_auth(&mut self) -> std::result::Result<bool, NativeError> {
        Ok(false)
    }

    fn default_key_paths() -> Vec<PathBuf> {
        let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))
        else {
            return Vec::new();
        };
        let ssh_dir = PathBuf::from(home).join(".ssh");
        DEFAULT_KEY_NAMES
            .iter()
            .map(|name| ssh_dir.join(name))
            .filter(|path| path.is_file())
            .collect()
    }
}

impl NativeSession for RusshSession {
    type PrivateKey = Arc<PrivateKey>;

    fn set_host(&mut self, host: &str) -> std::result::Result<(), NativeError> {
        if host.trim().is_empty() {
            return Err(NativeError::new("hostname is empty"));
        }
        self.host = Some(host.to_string());
        Ok(())
    }

    fn set_user(&mut self, user: &str) -> std::result::Result<(), NativeError> {
        if user.is_empty() {
            return Err(NativeError::new("username is empty"));
        }
        self.user = Some(user.to_string());
        Ok(())
    }

    fn set_port(&mut self, port: u16) -> std::result::Result<(), NativeError> {
        if port == 0 {
            return Err(NativeError::new("port must be between 1 and 65535"));
        }
        self.port = port;
        Ok(())
    }

    fn set_auth_callback(&mut self, credential: Arc<Credential>) {
        self.credential = Some(credential);
    }

    fn connect(&mut self) -> std::result::Result<(), NativeError> {
        let host = self
            .host
            .clone()
            .ok_or_else(|| NativeError::new("host option is not set"))?;
        let port = self.port;
        let timeout = self.config.timeout;

        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: self.config.inactivity_timeout,
            ..Default::default()
        });
        let handler = SshHandler {
            state: self.state.clone(),
        };

        let handle = self
            .runtime
            .block_on(async move {
                tokio::time::timeout(
                    timeout,
                    client::connect(ssh_config, (host.as_str(), port), handler),
                )
                .await
            })
            .map_err(|_| NativeError::new(format!("timed out after {:?}", timeout)))??;

        self.handle = Some(handle);
        Ok(())
    }

    fn server_public_key(&mut self) -> std::result::Result<Vec<u8>, NativeError> {
        self.state()
            .server_key
            .as_ref()
            .map(|key| key.public_key_bytes())
            .ok_or_else(|| NativeError::new("server public key is not available"))
    }

    fn is_server_known(&mut self) -> bool {
        let Some(key) = self.state().server_key.clone() else {
            return false;
        };
        let host = self.host.clone().unwrap_or_default();

        let result = match self.config.known_hosts_path {
            Some(ref path) => russh::keys::check_known_hosts_path(&host, self.port, &key, path),
            None => russh::keys::check_known_hosts(&host, self.port, &key),
        };

        match result {
            Ok(known) => known,
            Err(russh::keys::Error::KeyChanged { line }) => {
                warn!(
                    "Host key for {}:{} does not match known_hosts line {}",
                    host, self.port, line
                );
                false
            }
            Err(e) => {
                debug!("known_hosts lookup failed: {}", e);
                false
            }
        }
    }

    fn userauth_none(&mut self) -> Attempt {
        let user = self.user()?;
        let handle = self.handle.as_mut().ok_or_else(not_connected)?;
        let result = self.runtime.block_on(handle.authenticate_none(user))?;
        Ok(self.record(result))
    }

    fn userauth_list(&mut self) -> AuthMethods {
        self.methods
    }

    fn userauth_publickey(&mut self, key: &Arc<PrivateKey>) -> Attempt {
        let user = self.user()?;
        let handle = self.handle.as_mut().ok_or_else(not_connected)?;

        // Get the best RSA hash algorithm supported by the server
        let hash_alg = self
            .runtime
            .block_on(handle.best_supported_rsa_hash())?
            .flatten();

        let result = self.runtime.block_on(
            handle.authenticate_publickey(user, PrivateKeyWithHashAlg::new(key.clone(), hash_alg)),
        )?;
        Ok(self.record(result))
    }

    fn userauth_publickey_auto(&mut self) -> Attempt {
        if self.agent_auth()? {
            return Ok(AuthStatus::Success);
        }

        let mut status = AuthStatus::Denied;
        for path in Self::default_key_paths() {
            let key = match self.credential.clone() {
                Some(credential) => load_key(&path, &credential),
                None => load_key(&path, &Credential::literal("")),
            };
            let key = match key {
                Ok(key) => Arc::new(key),
                Err(e) => {
                    debug!("Skipping default key {}: {}", path.display(), e);
                    continue;
                }
            };

            debug!("Trying default key {}", path.display());
            status = self.userauth_publickey(&key)?;
            if status.is_success() {
                break;
            }
        }
        Ok(status)
    }

    fn userauth_kbdint(&mut self) -> std::result::Result<KbdintRound, NativeError> {
        let user = self.user()?;
        let handle = self.handle.as_mut().ok_or_else(not_connected)?;

        let response = match self.kbdint_answers.take() {
            None => self.runtime.block_on(
                handle.authenticate_keyboard_interactive_start(user, None::<String>),
            )?,
            Some(answers) => self
                .runtime
                .block_on(handle.authenticate_keyboard_interactive_respond(answers))?,
        };

        match response {
            KeyboardInteractiveAuthResponse::Success => Ok(KbdintRound::Done(AuthStatus::Success)),
            KeyboardInteractiveAuthResponse::Failure {
                remaining_methods,
                partial_success,
            } => Ok(KbdintRound::Done(
                self.record_failure(&remaining_methods, partial_success),
            )),
            KeyboardInteractiveAuthResponse::InfoRequest {
                name,
                instructions,
                prompts,
            } => {
                self.kbdint_answers = Some(vec![String::new(); prompts.len()]);
                Ok(KbdintRound::Info(KbdintRequest {
                    name,
                    instruction: instructions,
                    prompts: prompts
                        .into_iter()
                        .map(|p| KbdintPrompt::new(p.prompt, p.echo))
                        .collect(),
                }))
            }
        }
    }

    fn userauth_kbdint_set_answer(
        &mut self,
        index: usize,
        answer: &SecretString,
    ) -> std::result::Result<(), NativeError> {
        let answers = self
            .kbdint_answers
            .as_mut()
            .ok_or_else(|| NativeError::new("no keyboard-interactive round in progress"))?;
        let slot = answers
            .get_mut(index)
            .ok_or_else(|| NativeError::new(format!("prompt index {} out of range", index)))?;
        *slot = answer.expose_secret().to_owned();
        Ok(())
    }

    fn userauth_password(&mut self, password: &SecretString) -> Attempt {
        let user = self.user()?;
        let handle = self.handle.as_mut().ok_or_else(not_connected)?;
        let result = self
            .runtime
            .block_on(handle.authenticate_password(user, password.expose_secret()))?;
        Ok(self.record(result))
    }

    fn issue_banner(&mut self) -> Option<String> {
        self.state().banner.take()
    }

    fn disconnect(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let timeout = self.config.timeout;

        // The session task only runs while we block on it, so the disconnect
        // message is not written until we wait for the task to finish.
        self.runtime.block_on(async move {
            if let Err(e) = handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await
            {
                debug!("Disconnect failed: {}", e);
            }
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Session ended with error: {}", e),
                Err(_) => debug!("Session did not close within {:?}", timeout),
            }
        });
    }

    fn free(self) {
        // Fields drop in declaration order: the handle goes before its runtime.
        drop(self);
    }
}

fn methods_from(set: &MethodSet) -> AuthMethods {
    let mut methods = AuthMethods::empty();
    for kind in set.iter() {
        methods |= match kind {
            MethodKind::None => AuthMethods::NONE,
            MethodKind::Password => AuthMethods::PASSWORD,
            MethodKind::PublicKey => AuthMethods::PUBLIC_KEY,
            MethodKind::HostBased => AuthMethods::HOST_BASED,
            MethodKind::KeyboardInteractive => AuthMethods::KEYBOARD_INTERACTIVE,
        };
    }
    methods
}

/// SSH client handler for russh.
///
/// Accepts every server key; trust is judged after the handshake from the
/// stored key.
struct SshHandler {
    state: Arc<Mutex<HandlerState>>,
}

impl SshHandler {
    fn state(&self) -> MutexGuard<'_, HandlerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        self.state().server_key = Some(server_public_key.clone());
        Ok(true)
    }

    async fn auth_banner(
        &mut self,
        banner: &str,
        _session: &mut client::Session,
    ) -> std::result::Result<(), Self::Error> {
        self.state().banner = Some(banner.to_string());
        Ok(())
    }
}
