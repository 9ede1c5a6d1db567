//! Effects produced by state transitions

use super::event::{Attachment, MessageRef, Submitter};
use super::state::SessionId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Markup dialect of an outgoing text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    Plain,
    #[default]
    Markdown,
    Html,
}

/// Buttons attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Hide the reply keyboard (ClearKeyboard)
    Remove,
    /// One-time reply keyboard with the start-registration button (ShowStartButton)
    StartButton { label: String },
    /// Inline buttons under the summary
    Confirmation {
        offer_label: String,
        offer_url: String,
        confirm_label: String,
        restart_label: String,
    },
}

/// Callback data carried by the confirm button
pub const CONFIRM_CALLBACK: &str = "confirm_ok";
/// Callback data carried by the restart button
pub const RESTART_CALLBACK: &str = "restart";

/// A message to send into the session's chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub format: TextFormat,
    pub keyboard: Option<Keyboard>,
}

impl OutgoingMessage {
    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::Markdown,
            keyboard: None,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::Plain,
            keyboard: None,
        }
    }

    #[must_use]
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// A collected field, resolved against the schema for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedField {
    pub name: String,
    pub label: String,
    pub value: String,
}

/// Terminal artifact handed to the operator; not retained after handoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationSubmission {
    pub session_id: SessionId,
    pub submitter: Submitter,
    pub fields: Vec<SubmittedField>,
    pub proof: Attachment,
    pub submitted_at: DateTime<Utc>,
}

impl RegistrationSubmission {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a new message to the user
    SendMessage(OutgoingMessage),

    /// Replace the text of an earlier message (drops its inline buttons)
    EditMessage {
        message: MessageRef,
        text: String,
        format: TextFormat,
    },

    /// Acknowledge a button press, optionally with a short toast
    AnswerCallback {
        callback_id: String,
        text: Option<String>,
    },

    /// Hand the submission to the operator (best effort, at most once)
    NotifyOperator { submission: RegistrationSubmission },
}

impl Effect {
    pub fn send(message: OutgoingMessage) -> Self {
        Effect::SendMessage(message)
    }

    pub fn answer(callback_id: impl Into<String>) -> Self {
        Effect::AnswerCallback {
            callback_id: callback_id.into(),
            text: None,
        }
    }

    pub fn answer_with(callback_id: impl Into<String>, text: impl Into<String>) -> Self {
        Effect::AnswerCallback {
            callback_id: callback_id.into(),
            text: Some(text.into()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Effect::SendMessage(_) => "send_message",
            Effect::EditMessage { .. } => "edit_message",
            Effect::AnswerCallback { .. } => "answer_callback",
            Effect::NotifyOperator { .. } => "notify_operator",
        }
    }
}
