//! Events that can occur in a registration conversation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a message already delivered in some chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Kind of payload accepted as proof of payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Photo,
    Document,
}

/// An image or file the user sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub file_id: String,
    /// The message carrying the attachment, forwarded as-is to the operator
    pub message: MessageRef,
}

/// The person behind a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submitter {
    pub user_id: i64,
    pub full_name: String,
    pub username: Option<String>,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Global reset: back to the welcome screen with empty fields
    Reset,

    /// Begin (or begin again) collecting fields from the first one
    Start,

    /// Free text typed by the user
    TextInput { text: String },

    /// "Everything is correct" pressed under the summary
    Confirm {
        callback_id: String,
        message: MessageRef,
    },

    /// "Fill in again" pressed under the summary
    Restart {
        callback_id: String,
        message: MessageRef,
    },

    /// Photo or document received
    AttachmentInput {
        attachment: Attachment,
        submitter: Submitter,
        received_at: DateTime<Utc>,
    },
}

impl Event {
    /// Short name used in logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Reset => "reset",
            Event::Start => "start",
            Event::TextInput { .. } => "text_input",
            Event::Confirm { .. } => "confirm",
            Event::Restart { .. } => "restart",
            Event::AttachmentInput { .. } => "attachment_input",
        }
    }

    /// Callback query id for button presses, which must always be answered
    pub fn callback_id(&self) -> Option<&str> {
        match self {
            Event::Confirm { callback_id, .. } | Event::Restart { callback_id, .. } => {
                Some(callback_id)
            }
            _ => None,
        }
    }
}
