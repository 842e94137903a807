//! Informational output produced while a session is being set up.

use std::fmt;

use log::{info, warn};

/// A piece of information meant for the person driving the connection.
///
/// None of these are parsed back by the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The server's host key is not in the trust store.
    UnknownHost {
        /// Rendered fingerprint of the server key.
        fingerprint: String,
    },

    /// Name sent by the server with a keyboard-interactive round.
    InteractiveName(String),

    /// Instruction sent by the server with a keyboard-interactive round.
    InteractiveInstruction(String),

    /// Issue banner sent by the server after authentication.
    Banner(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::UnknownHost { fingerprint } => {
                write!(f, "Unknown server fingerprint: {}", fingerprint)
            }
            Notice::InteractiveName(text)
            | Notice::InteractiveInstruction(text)
            | Notice::Banner(text) => f.write_str(text),
        }
    }
}

/// Sink for [`Notice`]s.
pub trait Notifier {
    /// Deliver a notice.
    fn notify(&mut self, notice: Notice);
}

/// Forwards notices to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, notice: Notice) {
        match notice {
            Notice::UnknownHost { .. } => warn!("{}", notice),
            _ => info!("{}", notice),
        }
    }
}

/// Collects notices, e.g. to show them once the connection is up.
impl Notifier for Vec<Notice> {
    fn notify(&mut self, notice: Notice) {
        self.push(notice);
    }
}

impl<N: Notifier + ?Sized> Notifier for &mut N {
    fn notify(&mut self, notice: Notice) {
        (**self).notify(notice);
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&mut self, notice: Notice) {
        (**self).notify(notice);
    }
}
