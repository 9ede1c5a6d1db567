//! Mock implementations for testing
//!
//! These mocks enable integration testing of the dispatcher without a chat
//! platform behind it.

use super::store::InMemorySessionStore;
use super::traits::*;
use super::Dispatcher;
use crate::messages::Texts;
use crate::state_machine::effect::{OutgoingMessage, RegistrationSubmission, TextFormat};
use crate::state_machine::event::MessageRef;
use crate::state_machine::schema::{FieldSchema, Validator};
use crate::state_machine::RegContext;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Recording Transport
// ============================================================================

/// One recorded outbound action
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Send {
        chat_id: i64,
        message: OutgoingMessage,
    },
    Edit {
        message: MessageRef,
        text: String,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
    },
}

/// Transport that records everything it is asked to deliver
#[derive(Default)]
pub struct RecordingTransport {
    outbound: Mutex<Vec<Outbound>>,
    next_message_id: AtomicI64,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail without recording
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn outbound(&self) -> Vec<Outbound> {
        self.outbound.lock().unwrap().clone()
    }

    /// Texts of messages sent to one chat, in order
    pub fn sent_texts(&self, chat_id: i64) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Send { chat_id: c, message } if c == chat_id => Some(message.text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, outbound: Outbound) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError("mock transport is down".to_string()));
        }
        self.outbound.lock().unwrap().push(outbound);
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(
        &self,
        chat_id: i64,
        message: &OutgoingMessage,
    ) -> Result<MessageRef, TransportError> {
        self.record(Outbound::Send {
            chat_id,
            message: message.clone(),
        })?;
        Ok(MessageRef {
            chat_id,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }

    async fn edit_message(
        &self,
        message: MessageRef,
        text: &str,
        _format: TextFormat,
    ) -> Result<(), TransportError> {
        self.record(Outbound::Edit {
            message,
            text: text.to_string(),
        })
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.record(Outbound::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        })
    }
}

// ============================================================================
// Mock Operator Notifier
// ============================================================================

/// Notifier that records submissions, optionally failing after recording
#[derive(Default)]
pub struct MockNotifier {
    submissions: Mutex<Vec<RegistrationSubmission>>,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn submissions(&self) -> Vec<RegistrationSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl OperatorNotifier for MockNotifier {
    async fn notify(&self, submission: &RegistrationSubmission) -> Result<(), NotifyError> {
        self.submissions.lock().unwrap().push(submission.clone());
        if self.fail {
            Err(NotifyError::Report("mock operator chat unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Test Dispatcher Builder
// ============================================================================

/// Dispatcher wired to in-memory mocks, with handles to inspect them
pub struct TestHarness {
    pub dispatcher: Dispatcher<InMemorySessionStore, RecordingTransport, MockNotifier>,
    pub store: Arc<InMemorySessionStore>,
    pub transport: Arc<RecordingTransport>,
    pub notifier: Arc<MockNotifier>,
}

/// Helper for building test dispatchers with minimal boilerplate
pub struct TestDispatcher {
    context: RegContext,
    notifier: MockNotifier,
    worker_idle: Option<Duration>,
}

impl TestDispatcher {
    pub fn new() -> Self {
        Self {
            context: RegContext::new(FieldSchema::basic(Validator::Contact), Texts::default()),
            notifier: MockNotifier::new(),
            worker_idle: None,
        }
    }

    pub fn context(mut self, context: RegContext) -> Self {
        self.context = context;
        self
    }

    pub fn failing_notifier(mut self) -> Self {
        self.notifier = MockNotifier::failing();
        self
    }

    pub fn worker_idle(mut self, idle: Duration) -> Self {
        self.worker_idle = Some(idle);
        self
    }

    pub fn build(self) -> TestHarness {
        let store = Arc::new(InMemorySessionStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let notifier = Arc::new(self.notifier);

        let mut dispatcher = Dispatcher::new(
            self.context,
            store.clone(),
            transport.clone(),
            notifier.clone(),
        );
        if let Some(idle) = self.worker_idle {
            dispatcher = dispatcher.with_worker_idle(idle);
        }

        TestHarness {
            dispatcher,
            store,
            transport,
            notifier,
        }
    }
}

impl Default for TestDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_transport_assigns_message_ids() {
        let transport = RecordingTransport::new();
        let first = transport
            .send_message(5, &OutgoingMessage::plain("a"))
            .await
            .unwrap();
        let second = transport
            .send_message(5, &OutgoingMessage::plain("b"))
            .await
            .unwrap();
        assert_eq!(first.chat_id, 5);
        assert!(second.message_id > first.message_id);
        assert_eq!(transport.sent_texts(5), ["a", "b"]);
    }

    #[tokio::test]
    async fn failing_transport_records_nothing() {
        let transport = RecordingTransport::new();
        transport.set_failing(true);
        assert!(transport.answer_callback("cb", None).await.is_err());
        assert!(transport.outbound().is_empty());
    }
}
