//! Keyboard-interactive sub-protocol.
//!
//! The server sends rounds of prompts until it reaches a verdict. Each
//! prompt is answered through the credential, in index order.

use log::debug;

use crate::credential::Credential;
use crate::error::Result;
use crate::notice::{Notice, Notifier};
use crate::transport::{Attempt, KbdintRound, NativeSession};

/// Run the exchange until the server stops sending information requests.
///
/// The outer `Result` carries fatal errors (the credential could not
/// answer). The inner [`Attempt`] is the exchange's own verdict: a native
/// error from the challenge request or a rejected answer ends the exchange
/// without touching the remaining prompts.
pub(crate) fn run<S: NativeSession>(
    session: &mut S,
    credential: &Credential,
    notifier: &mut dyn Notifier,
) -> Result<Attempt> {
    let mut round = match session.userauth_kbdint() {
        Ok(round) => round,
        Err(e) => return Ok(Err(e)),
    };

    loop {
        let request = match round {
            KbdintRound::Done(status) => return Ok(Ok(status)),
            KbdintRound::Info(request) => request,
        };
        debug!(
            "Keyboard-interactive round with {} prompt(s)",
            request.prompts.len()
        );

        if !request.name.is_empty() {
            notifier.notify(Notice::InteractiveName(request.name));
        }
        if !request.instruction.is_empty() {
            notifier.notify(Notice::InteractiveInstruction(request.instruction));
        }

        for (index, prompt) in request.prompts.iter().enumerate() {
            debug!("Answering prompt {} (echo: {})", index, prompt.echo);
            let answer = credential.resolve(&prompt.text)?;
            if let Err(e) = session.userauth_kbdint_set_answer(index, &answer) {
                debug!("Answer to prompt {} rejected: {}", index, e);
                return Ok(Err(e));
            }
        }

        round = match session.userauth_kbdint() {
            Ok(round) => round,
            Err(e) => return Ok(Err(e)),
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{Error, NativeError};
    use crate::transport::fake::{Call, FakeLibrary, Script};
    use crate::transport::{AuthStatus, KbdintPrompt, KbdintRequest, NativeLibrary};

    fn info(name: &str, instruction: &str, prompts: &[&str]) -> KbdintRound {
        KbdintRound::Info(KbdintRequest {
            name: name.to_string(),
            instruction: instruction.to_string(),
            prompts: prompts.iter().map(|p| KbdintPrompt::new(*p, false)).collect(),
        })
    }

    fn counting_credential(answer: &'static str) -> (Credential, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let credential = Credential::callback(move |_: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some(answer.to_string()))
        });
        (credential, calls)
    }

    #[test]
    fn test_answers_prompts_in_order() {
        let library = FakeLibrary::new(Script {
            kbdint_rounds: vec![
                Ok(info("", "", &["Password: ", "Verification code: "])),
                Ok(KbdintRound::Done(AuthStatus::Success)),
            ]
            .into(),
            ..Default::default()
        });
        let mut session = library.new_session().unwrap();
        let mut notices: Vec<Notice> = Vec::new();

        let result = run(&mut session, &Credential::literal("s3cret"), &mut notices).unwrap();
        assert_eq!(result, Ok(AuthStatus::Success));
        assert_eq!(
            library.auth_calls(),
            vec![
                Call::Kbdint,
                Call::SetAnswer(0, "s3cret".to_string()),
                Call::SetAnswer(1, "s3cret".to_string()),
                Call::Kbdint,
            ]
        );
        assert!(notices.is_empty());
    }

    #[test]
    fn test_zero_prompt_round_reissues_challenge() {
        let library = FakeLibrary::new(Script {
            kbdint_rounds: vec![
                Ok(info("", "", &[])),
                Ok(info("", "", &["Token: "])),
                Ok(KbdintRound::Done(AuthStatus::Success)),
            ]
            .into(),
            ..Default::default()
        });
        let mut session = library.new_session().unwrap();
        let (credential, resolved) = counting_credential("424242");
        let mut notices: Vec<Notice> = Vec::new();

        let result = run(&mut session, &credential, &mut notices).unwrap();
        assert_eq!(result, Ok(AuthStatus::Success));
        assert_eq!(resolved.load(Ordering::SeqCst), 1);
        assert_eq!(library.count(&Call::Kbdint), 3);
    }

    #[test]
    fn test_rejected_answer_aborts_round() {
        let library = FakeLibrary::new(Script {
            kbdint_rounds: vec![Ok(info("", "", &["One: ", "Two: ", "Three: "]))].into(),
            reject_answer_at: Some(0),
            ..Default::default()
        });
        let mut session = library.new_session().unwrap();
        let (credential, resolved) = counting_credential("x");
        let mut notices: Vec<Notice> = Vec::new();

        let result = run(&mut session, &credential, &mut notices).unwrap();
        assert_eq!(result, Err(NativeError::new("answer rejected")));
        assert_eq!(resolved.load(Ordering::SeqCst), 1);
        assert_eq!(
            library.auth_calls(),
            vec![Call::Kbdint, Call::SetAnswer(0, "x".to_string())]
        );
    }

    #[test]
    fn test_name_and_instruction_are_surfaced() {
        let library = FakeLibrary::new(Script {
            kbdint_rounds: vec![
                Ok(info("Duo Security", "Enter a passcode", &["Passcode: "])),
                Ok(KbdintRound::Done(AuthStatus::Denied)),
            ]
            .into(),
            ..Default::default()
        });
        let mut session = library.new_session().unwrap();
        let mut notices: Vec<Notice> = Vec::new();

        let result = run(&mut session, &Credential::literal("1"), &mut notices).unwrap();
        assert_eq!(result, Ok(AuthStatus::Denied));
        assert_eq!(
            notices,
            vec![
                Notice::InteractiveName("Duo Security".to_string()),
                Notice::InteractiveInstruction("Enter a passcode".to_string()),
            ]
        );
    }

    #[test]
    fn test_credential_failure_is_fatal() {
        let library = FakeLibrary::new(Script {
            kbdint_rounds: vec![Ok(info("", "", &["Password: "]))].into(),
            ..Default::default()
        });
        let mut session = library.new_session().unwrap();
        let credential = Credential::callback(|_: &str| Ok(None));
        let mut notices: Vec<Notice> = Vec::new();

        let err = run(&mut session, &credential, &mut notices).unwrap_err();
        assert!(matches!(err, Error::Credential { .. }));
        assert_eq!(library.count(&Call::SetAnswer(0, String::new())), 0);
    }

    #[test]
    fn test_challenge_error_ends_exchange() {
        let library = FakeLibrary::new(Script {
            kbdint_rounds: vec![Err(NativeError::new("method not supported"))].into(),
            ..Default::default()
        });
        let mut session = library.new_session().unwrap();
        let mut notices: Vec<Notice> = Vec::new();

        let result = run(&mut session, &Credential::literal("1"), &mut notices).unwrap();
        assert!(result.is_err());
    }
}
