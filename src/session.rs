//! Turn handling: history, request, dispatch and presentation wired together.

use crate::crypto::Credential;
use crate::dispatch::{AssistantReply, DispatchError, Dispatcher, FALLBACK_REPLY, Transport};
use crate::history::{ConversationHistory, Message, Role};
use crate::request::RequestBuilder;

pub const PENDING_TEXT: &str = "सोच रहा हूँ...";

pub fn welcome_message(organization: &str) -> String {
    format!(
        "नमस्ते, मैं {organization} AI, आपका AI सहायक 👋\n\nबताइए मैं आपकी कैसे मदद कर सकता हूँ।"
    )
}

/// Where messages end up. User text arrives raw; assistant text arrives as
/// Markdown and the presenter decides how to render it.
pub trait Presenter {
    fn message(&mut self, text: &str, sender: Role);
    /// Show the transient "waiting for reply" indicator.
    fn pending(&mut self);
    /// Remove the indicator shown by [`Presenter::pending`].
    fn settle(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending,
    Succeeded,
    Failed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank input; nothing was sent or recorded.
    Ignored,
    Replied(AssistantReply),
    /// The fallback text was presented in place of a reply.
    Failed(DispatchError),
}

pub struct ChatSession<T, P> {
    organization: String,
    credential: Credential,
    history: ConversationHistory,
    builder: RequestBuilder,
    dispatcher: Dispatcher<T>,
    presenter: P,
    state: TurnState,
}

impl<T: Transport, P: Presenter> ChatSession<T, P> {
    pub fn new(
        organization: impl Into<String>,
        credential: Credential,
        builder: RequestBuilder,
        dispatcher: Dispatcher<T>,
        presenter: P,
    ) -> Self {
        Self {
            organization: organization.into(),
            credential,
            history: ConversationHistory::new(),
            builder,
            dispatcher,
            presenter,
            state: TurnState::Idle,
        }
    }

    /// Present the welcome message and record it as the first assistant message.
    pub fn greet(&mut self) {
        let welcome = welcome_message(&self.organization);
        self.presenter.message(&welcome, Role::Assistant);
        self.history.append(Message::assistant(welcome));
    }

    /// Run one turn. The exclusive borrow keeps turns from overlapping.
    pub fn send(&mut self, text: &str) -> TurnOutcome {
        if text.trim().is_empty() {
            return TurnOutcome::Ignored;
        }

        self.presenter.message(text, Role::User);
        self.history.append(Message::user(text));

        self.state = TurnState::Sending;
        self.presenter.pending();

        let payload = self.builder.build(&self.history, &self.organization);
        let result = self.dispatcher.dispatch(&payload, self.credential.expose());

        self.presenter.settle();

        match result {
            Ok(reply) => {
                self.presenter.message(&reply.text, Role::Assistant);
                self.history.append(Message::assistant(reply.text.clone()));
                self.state = TurnState::Succeeded;
                TurnOutcome::Replied(reply)
            }
            Err(err) => {
                log::warn!("turn failed: {err}");
                self.presenter.message(FALLBACK_REPLY, Role::Assistant);
                self.state = TurnState::Failed;
                TurnOutcome::Failed(err)
            }
        }
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }
}
