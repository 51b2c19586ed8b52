use anyhow::{Context, Result};
use std::io::Write;

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod history;
pub mod render;
pub mod request;
pub mod session;
pub mod terminal;
pub mod transcript;

#[cfg(test)]
mod test_utils;

pub use config::{Config, WidgetConfig};
pub use crypto::{Credential, CryptoError, DerivedKey, KdfParams};
pub use dispatch::{
    AssistantReply, DispatchError, DispatchErrorKind, Dispatcher, FALLBACK_REPLY, HttpReply,
    Transport, UreqTransport,
};
pub use history::{ConversationHistory, Message, Role};
pub use request::{RequestBuilder, RequestPayload, build_request};
pub use session::{ChatSession, Presenter, TurnOutcome, TurnState};
pub use terminal::TerminalPresenter;

/// Open the widget's sealed credential. Runs once at startup; failures are fatal.
pub fn unveil_credential(widget: &WidgetConfig) -> Result<Credential> {
    let params = widget.kdf_params();
    if params.uses_legacy_salt() {
        log::warn!("widget secret is sealed with the shared fixed salt; reseal it with a per-secret salt");
    }
    let credential = crypto::unveil(&widget.k, &widget.temp, &params)
        .context("failed to unveil API credential")?;
    log::info!("credential unveiled ({})", credential.fingerprint());
    Ok(credential)
}

/// Load the widget config, unveil its credential and set up a session
/// talking to the configured endpoint.
pub fn open_session<P: Presenter>(
    config: &Config,
    widget: &WidgetConfig,
    presenter: P,
) -> Result<ChatSession<UreqTransport, P>> {
    let credential = unveil_credential(widget)?;
    let dispatcher = Dispatcher::new(config.endpoint.clone(), UreqTransport::new(config.timeout()));
    Ok(ChatSession::new(
        widget.org.clone(),
        credential,
        RequestBuilder::from_config(config),
        dispatcher,
        presenter,
    ))
}

/// One-shot turn: greet, send `message`, and report whether a reply came back.
/// A failed turn has already presented the fallback text; its detail goes
/// to the log only.
pub fn ask_once<T: Transport, P: Presenter>(session: &mut ChatSession<T, P>, message: &str) -> bool {
    session.greet();
    !matches!(session.send(message), TurnOutcome::Failed(_))
}

/// Seal `plain_text` for a widget config and print the summary to `out`.
pub fn seal_secret(
    plain_text: &str,
    password: &str,
    params: &KdfParams,
    mut out: impl Write,
) -> Result<String> {
    if params.uses_legacy_salt() {
        log::warn!("sealing with the shared fixed salt; pass --salt for a per-secret salt");
    }
    let sealed = crypto::encrypt_with(plain_text, password, params)?;
    writeln!(out, "{sealed}")?;
    Ok(sealed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(k: String, salt: &str) -> WidgetConfig {
        WidgetConfig {
            org: "Acme".to_string(),
            temp: "pw".to_string(),
            k,
            suggestions: vec![],
            salt: Some(salt.to_string()),
            iterations: Some(1_000),
        }
    }

    #[test]
    fn seal_then_unveil() {
        let params = KdfParams::new("per-secret", 1_000);
        let mut out = Vec::new();
        let sealed = seal_secret("sk-abc", "pw", &params, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{sealed}\n"));

        let credential = unveil_credential(&widget(sealed, "per-secret")).unwrap();
        assert_eq!(credential.expose(), "sk-abc");
    }

    #[test]
    fn unveil_with_wrong_salt_fails() {
        let sealed = crypto::encrypt_with("sk-abc", "pw", &KdfParams::new("a", 1_000)).unwrap();
        let err = unveil_credential(&widget(sealed, "b")).unwrap_err();
        assert!(err.to_string().contains("failed to unveil"));
        assert!(matches!(
            err.downcast_ref::<CryptoError>(),
            Some(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn open_session_uses_config() {
        let sealed = crypto::encrypt_with("sk-abc", "pw", &KdfParams::new("s", 1_000)).unwrap();
        let config = Config {
            history_window: 3,
            ..Config::default()
        };
        let session = open_session(&config, &widget(sealed, "s"), test_utils::RecordingPresenter::default())
            .unwrap();
        assert_eq!(session.organization(), "Acme");
        assert_eq!(session.state(), TurnState::Idle);
    }

    fn scripted_session(
        transport: test_utils::ScriptedTransport,
    ) -> ChatSession<test_utils::ScriptedTransport, test_utils::RecordingPresenter> {
        ChatSession::new(
            "Acme",
            Credential::new("sk-abc"),
            RequestBuilder::default(),
            Dispatcher::new(dispatch::DEFAULT_ENDPOINT, transport),
            test_utils::RecordingPresenter::default(),
        )
    }

    #[test]
    fn ask_once_hides_error_detail() {
        let transport = test_utils::ScriptedTransport::new();
        transport.push_reply(401, r#"{"error": {"message": "Incorrect API key provided"}}"#);
        let mut session = scripted_session(transport);

        assert!(!ask_once(&mut session, "Hello"));
        assert_eq!(session.presenter().last_text(), Some(FALLBACK_REPLY));
        assert!(session.presenter().events.iter().all(|event| match event {
            test_utils::Presented::Message(_, text) => !text.contains("Incorrect API key"),
            _ => true,
        }));
    }

    #[test]
    fn ask_once_reports_reply() {
        let transport = test_utils::ScriptedTransport::new();
        transport.push_reply(
            200,
            r#"{"output": [{"type": "message", "content": [{"text": "hi"}]}]}"#,
        );
        let mut session = scripted_session(transport);

        assert!(ask_once(&mut session, "Hello"));
        assert_eq!(session.history().len(), 3);
        assert_eq!(session.presenter().last_text(), Some("hi"));
    }
}
