//! Translation of Bot API updates into conversation events

use super::types::{CallbackQuery, Message, Update};
use crate::state_machine::effect::{CONFIRM_CALLBACK, RESTART_CALLBACK};
use crate::state_machine::event::{Attachment, AttachmentKind, MessageRef, Submitter};
use crate::state_machine::{Event, SessionId};
use chrono::{DateTime, Utc};

/// What the poller should do with one update
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Route to the session's worker
    Dispatch { session_id: SessionId, event: Event },
    /// A button press with nothing to route; it still has to be answered
    Acknowledge { callback_id: String },
}

/// Map an update to an event. Updates the bot does not handle yield `None`.
pub fn translate(update: Update, start_label: &str) -> Option<Inbound> {
    if let Some(query) = update.callback_query {
        return Some(translate_callback(query));
    }
    translate_message(update.message?, start_label)
}

fn translate_message(message: Message, start_label: &str) -> Option<Inbound> {
    let from = message.from.as_ref()?;
    if from.is_bot || message.chat.kind != "private" {
        return None;
    }
    let session_id = SessionId(message.chat.id);
    let message_ref = MessageRef {
        chat_id: message.chat.id,
        message_id: message.message_id,
    };

    let attachment = if let Some(largest) = message
        .photo
        .as_ref()
        .and_then(|sizes| sizes.iter().max_by_key(|p| u64::from(p.width) * u64::from(p.height)))
    {
        Some(Attachment {
            kind: AttachmentKind::Photo,
            file_id: largest.file_id.clone(),
            message: message_ref,
        })
    } else {
        message.document.as_ref().map(|doc| Attachment {
            kind: AttachmentKind::Document,
            file_id: doc.file_id.clone(),
            message: message_ref,
        })
    };

    if let Some(attachment) = attachment {
        let received_at = DateTime::from_timestamp(message.date, 0).unwrap_or_else(Utc::now);
        return Some(Inbound::Dispatch {
            session_id,
            event: Event::AttachmentInput {
                attachment,
                submitter: Submitter {
                    user_id: from.id,
                    full_name: from.full_name(),
                    username: from.username.clone(),
                },
                received_at,
            },
        });
    }

    let text = message.text?;
    let event = match command(&text) {
        Some("start") => Event::Reset,
        Some("register") => Event::Start,
        _ if text.trim() == start_label => Event::Start,
        _ => Event::TextInput { text },
    };
    Some(Inbound::Dispatch { session_id, event })
}

fn translate_callback(query: CallbackQuery) -> Inbound {
    let callback_id = query.id;
    let Some(message) = query.message else {
        return Inbound::Acknowledge { callback_id };
    };
    let message = MessageRef {
        chat_id: message.chat.id,
        message_id: message.message_id,
    };
    let session_id = SessionId(message.chat_id);

    let event = match query.data.as_deref() {
        Some(CONFIRM_CALLBACK) => Event::Confirm {
            callback_id,
            message,
        },
        Some(RESTART_CALLBACK) => Event::Restart {
            callback_id,
            message,
        },
        _ => return Inbound::Acknowledge { callback_id },
    };
    Inbound::Dispatch { session_id, event }
}

/// Bot command name without the slash or `@botname` suffix
fn command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    Some(name.split('@').next().unwrap_or(name))
}
