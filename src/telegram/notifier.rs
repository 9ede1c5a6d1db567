//! Operator handoff over the Bot API

use super::client::{parse_mode, TelegramClient};
use super::types::{CopyMessageRequest, SendMessageRequest};
use crate::messages::{self, Texts};
use crate::runtime::{NotifyError, OperatorNotifier};
use crate::state_machine::effect::{RegistrationSubmission, TextFormat};
use async_trait::async_trait;
use std::sync::Arc;

/// Posts an HTML report to the operator chat, then copies the proof after it
pub struct TelegramOperatorNotifier {
    client: Arc<TelegramClient>,
    admin_chat: Option<i64>,
    texts: Texts,
}

impl TelegramOperatorNotifier {
    pub fn new(client: Arc<TelegramClient>, admin_chat: Option<i64>, texts: Texts) -> Self {
        Self {
            client,
            admin_chat,
            texts,
        }
    }
}

#[async_trait]
impl OperatorNotifier for TelegramOperatorNotifier {
    async fn notify(&self, submission: &RegistrationSubmission) -> Result<(), NotifyError> {
        let Some(admin_chat) = self.admin_chat else {
            return Err(NotifyError::NotConfigured);
        };

        let report = SendMessageRequest {
            chat_id: admin_chat,
            text: messages::operator_report(submission, &self.texts),
            parse_mode: parse_mode(TextFormat::Html),
            reply_markup: None,
        };
        self.client
            .send_message(&report)
            .await
            .map_err(|e| NotifyError::Report(e.to_string()))?;

        let proof = &submission.proof.message;
        let copied = self
            .client
            .copy_message(&CopyMessageRequest {
                chat_id: admin_chat,
                from_chat_id: proof.chat_id,
                message_id: proof.message_id,
            })
            .await
            .map_err(|e| NotifyError::Forward(e.to_string()))?;
        tracing::debug!(
            session_id = %submission.session_id,
            message_id = copied.message_id,
            "Proof copied to operator chat"
        );
        Ok(())
    }
}
