//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::state_machine::effect::{OutgoingMessage, RegistrationSubmission, TextFormat};
use crate::state_machine::event::MessageRef;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// An outbound send/edit/answer failed. Fatal to that single action only.
#[derive(Debug, Clone, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Operator notification failed. Logged, never retried.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("operator chat is not configured")]
    NotConfigured,
    #[error("failed to deliver report: {0}")]
    Report(String),
    #[error("failed to forward proof of payment: {0}")]
    Forward(String),
}

/// Delivers messages to the chat a session lives in
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a new message, returning a reference to it
    async fn send_message(
        &self,
        chat_id: i64,
        message: &OutgoingMessage,
    ) -> Result<MessageRef, TransportError>;

    /// Replace the text of an existing message
    async fn edit_message(
        &self,
        message: MessageRef,
        text: &str,
        format: TextFormat,
    ) -> Result<(), TransportError>;

    /// Acknowledge a button press
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;
}

/// Hands finished registrations to a human operator
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify(&self, submission: &RegistrationSubmission) -> Result<(), NotifyError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_message(
        &self,
        chat_id: i64,
        message: &OutgoingMessage,
    ) -> Result<MessageRef, TransportError> {
        (**self).send_message(chat_id, message).await
    }

    async fn edit_message(
        &self,
        message: MessageRef,
        text: &str,
        format: TextFormat,
    ) -> Result<(), TransportError> {
        (**self).edit_message(message, text, format).await
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        (**self).answer_callback(callback_id, text).await
    }
}

#[async_trait]
impl<N: OperatorNotifier + ?Sized> OperatorNotifier for Arc<N> {
    async fn notify(&self, submission: &RegistrationSubmission) -> Result<(), NotifyError> {
        (**self).notify(submission).await
    }
}
