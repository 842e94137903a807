//! Scripted native library that records every primitive it is asked to run.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use super::native::{Attempt, AuthMethods, AuthStatus, KbdintRound, NativeLibrary, NativeSession};
use crate::credential::Credential;
use crate::error::{Error, NativeError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    ImportKey(String),
    NewSession,
    SetHost(String),
    SetUser(String),
    SetPort(u16),
    SetAuthCallback,
    Connect,
    ServerPublicKey,
    IsServerKnown,
    None,
    List,
    PublicKey(String),
    PublicKeyAuto,
    Kbdint,
    SetAnswer(usize, String),
    Password(String),
    Banner,
    Disconnect,
    Free,
}

/// How the fake answers each primitive.
#[derive(Debug, Clone)]
pub(crate) struct Script {
    pub fail_new_session: bool,
    pub fail_set_host: bool,
    pub fail_set_user: bool,
    pub fail_set_port: bool,
    pub fail_connect: bool,
    pub fail_server_key: bool,
    pub key_file_ok: bool,
    pub key_encrypted: bool,
    pub known_host: bool,
    pub none: Attempt,
    pub methods: AuthMethods,
    pub publickey: Attempt,
    pub publickey_auto: Attempt,
    pub kbdint_rounds: VecDeque<std::result::Result<KbdintRound, NativeError>>,
    pub reject_answer_at: Option<usize>,
    pub accepted_password: Option<String>,
    pub password_error: bool,
    pub banner: Option<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_new_session: false,
            fail_set_host: false,
            fail_set_user: false,
            fail_set_port: false,
            fail_connect: false,
            fail_server_key: false,
            key_file_ok: true,
            key_encrypted: false,
            known_host: true,
            none: Ok(AuthStatus::Denied),
            methods: AuthMethods::empty(),
            publickey: Ok(AuthStatus::Denied),
            publickey_auto: Ok(AuthStatus::Denied),
            kbdint_rounds: VecDeque::new(),
            reject_answer_at: None,
            accepted_password: None,
            password_error: false,
            banner: None,
        }
    }
}

type CallLog = Rc<RefCell<Vec<Call>>>;

pub(crate) struct FakeLibrary {
    script: Script,
    calls: CallLog,
}

impl FakeLibrary {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.borrow().iter().filter(|c| *c == call).count()
    }

    /// Whether the session was released exactly once, disconnect first.
    pub fn torn_down_once(&self) -> bool {
        let calls = self.calls.borrow();
        let disconnects: Vec<usize> = positions(&calls, &Call::Disconnect);
        let frees: Vec<usize> = positions(&calls, &Call::Free);
        disconnects.len() == 1 && frees.len() == 1 && disconnects[0] < frees[0]
    }

    /// Auth primitives that were issued, in order.
    pub fn auth_calls(&self) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::None
                        | Call::PublicKey(_)
                        | Call::PublicKeyAuto
                        | Call::Kbdint
                        | Call::SetAnswer(..)
                        | Call::Password(_)
                )
            })
            .cloned()
            .collect()
    }
}

fn positions(calls: &[Call], wanted: &Call) -> Vec<usize> {
    calls
        .iter()
        .enumerate()
        .filter(|(_, c)| *c == wanted)
        .map(|(i, _)| i)
        .collect()
}

impl NativeLibrary for FakeLibrary {
    type Session = FakeSession;

    fn new_session(&self) -> std::result::Result<FakeSession, NativeError> {
        self.calls.borrow_mut().push(Call::NewSession);
        if self.script.fail_new_session {
            return Err(NativeError::new("out of memory"));
        }
        Ok(FakeSession {
            script: self.script.clone(),
            calls: self.calls.clone(),
            credential: None,
        })
    }

    fn import_private_key(&self, path: &Path, passphrase: &Credential) -> Result<String> {
        let name = path.display().to_string();
        self.calls.borrow_mut().push(Call::ImportKey(name.clone()));
        if self.script.key_encrypted {
            passphrase.resolve("Enter passphrase for key: ")?;
        }
        if !self.script.key_file_ok {
            return Err(Error::KeyFile {
                path: path.to_path_buf(),
                message: "invalid key format".to_string(),
            });
        }
        Ok(name)
    }
}

pub(crate) struct FakeSession {
    script: Script,
    calls: CallLog,
    credential: Option<Arc<Credential>>,
}

impl FakeSession {
    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn fail_if(flag: bool, message: &str) -> std::result::Result<(), NativeError> {
        if flag {
            Err(NativeError::new(message))
        } else {
            Ok(())
        }
    }

    pub fn has_auth_callback(&self) -> bool {
        self.credential.is_some()
    }
}

impl NativeSession for FakeSession {
    type PrivateKey = String;

    fn set_host(&mut self, host: &str) -> std::result::Result<(), NativeError> {
        self.record(Call::SetHost(host.to_string()));
        Self::fail_if(self.script.fail_set_host, "invalid hostname")
    }

    fn set_user(&mut self, user: &str) -> std::result::Result<(), NativeError> {
        self.record(Call::SetUser(user.to_string()));
        Self::fail_if(self.script.fail_set_user, "invalid user")
    }

    fn set_port(&mut self, port: u16) -> std::result::Result<(), NativeError> {
        self.record(Call::SetPort(port));
        Self::fail_if(self.script.fail_set_port || port == 0, "invalid port")
    }

    fn set_auth_callback(&mut self, credential: Arc<Credential>) {
        self.record(Call::SetAuthCallback);
        self.credential = Some(credential);
    }

    fn connect(&mut self) -> std::result::Result<(), NativeError> {
        self.record(Call::Connect);
        Self::fail_if(self.script.fail_connect, "Connection refused")
    }

    fn server_public_key(&mut self) -> std::result::Result<Vec<u8>, NativeError> {
        self.record(Call::ServerPublicKey);
        Self::fail_if(self.script.fail_server_key, "no server key")?;
        Ok(b"ssh-ed25519 fake host key".to_vec())
    }

    fn is_server_known(&mut self) -> bool {
        self.record(Call::IsServerKnown);
        self.script.known_host
    }

    fn userauth_none(&mut self) -> Attempt {
        self.record(Call::None);
        self.script.none.clone()
    }

    fn userauth_list(&mut self) -> AuthMethods {
        self.record(Call::List);
        self.script.methods
    }

    fn userauth_publickey(&mut self, key: &String) -> Attempt {
        self.record(Call::PublicKey(key.clone()));
        self.script.publickey.clone()
    }

    fn userauth_publickey_auto(&mut self) -> Attempt {
        self.record(Call::PublicKeyAuto);
        self.script.publickey_auto.clone()
    }

    fn userauth_kbdint(&mut self) -> std::result::Result<KbdintRound, NativeError> {
        self.record(Call::Kbdint);
        self.script
            .kbdint_rounds
            .pop_front()
            .unwrap_or(Ok(KbdintRound::Done(AuthStatus::Denied)))
    }

    fn userauth_kbdint_set_answer(
        &mut self,
        index: usize,
        answer: &SecretString,
    ) -> std::result::Result<(), NativeError> {
        self.record(Call::SetAnswer(index, answer.expose_secret().to_owned()));
        Self::fail_if(self.script.reject_answer_at == Some(index), "answer rejected")
    }

    fn userauth_password(&mut self, password: &SecretString) -> Attempt {
        let password = password.expose_secret().to_owned();
        self.record(Call::Password(password.clone()));
        if self.script.password_error {
            return Err(NativeError::new("socket closed"));
        }
        match self.script.accepted_password {
            Some(ref accepted) if *accepted == password => Ok(AuthStatus::Success),
            _ => Ok(AuthStatus::Denied),
        }
    }

    fn issue_banner(&mut self) -> Option<String> {
        self.record(Call::Banner);
        self.script.banner.take()
    }

    fn disconnect(&mut self) {
        self.record(Call::Disconnect);
    }

    fn free(self) {
        self.record(Call::Free);
    }
}
