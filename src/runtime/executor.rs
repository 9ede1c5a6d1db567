//! Per-session worker
//!
//! One worker owns the event queue of one session and applies events strictly
//! in arrival order, so `(state, fields)` is never read-modified-written by two
//! events at once. Unrelated sessions run in their own workers.

use super::store::SessionStore;
use super::traits::{OperatorNotifier, Transport};
use super::WorkerRegistry;
use crate::state_machine::{transition, Effect, Event, FieldsUpdate, RegContext, SessionId, TransitionResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// Generic session worker that can work with any store, transport and notifier
pub struct SessionRuntime<S, T, N>
where
    S: SessionStore + 'static,
    T: Transport + 'static,
    N: OperatorNotifier + 'static,
{
    session_id: SessionId,
    context: Arc<RegContext>,
    store: Arc<S>,
    transport: Arc<T>,
    notifier: Arc<N>,
    event_rx: mpsc::UnboundedReceiver<Event>,
    workers: WorkerRegistry,
    idle_timeout: Duration,
}

impl<S, T, N> SessionRuntime<S, T, N>
where
    S: SessionStore + 'static,
    T: Transport + 'static,
    N: OperatorNotifier + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: SessionId,
        context: Arc<RegContext>,
        store: Arc<S>,
        transport: Arc<T>,
        notifier: Arc<N>,
        event_rx: mpsc::UnboundedReceiver<Event>,
        workers: WorkerRegistry,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            session_id,
            context,
            store,
            transport,
            notifier,
            event_rx,
            workers,
            idle_timeout,
        }
    }

    pub async fn run(mut self) {
        tracing::debug!(session_id = %self.session_id, "Session worker started");

        loop {
            match tokio::time::timeout(self.idle_timeout, self.event_rx.recv()).await {
                Ok(Some(event)) => self.process_event(event).await,
                Ok(None) => break,
                Err(_) => {
                    // Senders only push while holding the registry read lock, so
                    // an empty queue under the write lock stays empty until we
                    // deregister.
                    let mut workers = self.workers.write().await;
                    match self.event_rx.try_recv() {
                        Ok(event) => {
                            drop(workers);
                            self.process_event(event).await;
                        }
                        Err(TryRecvError::Empty | TryRecvError::Disconnected) => {
                            workers.remove(&self.session_id);
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!(session_id = %self.session_id, "Session worker stopped");
    }

    async fn process_event(&self, event: Event) {
        let callback_id = event.callback_id().map(str::to_string);
        let session = self.store.get_or_create(self.session_id).await;

        let result = match transition(&session, &self.context, event) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(session_id = %self.session_id, error = %e, "Dropping event");
                // Stale buttons still need an answer or the client keeps spinning
                if let Some(callback_id) = callback_id {
                    self.execute_effect(Effect::answer(callback_id)).await;
                }
                return;
            }
        };

        // State is committed before any effect runs; effect failures never roll it back
        self.commit(&result).await;

        tracing::debug!(
            session_id = %self.session_id,
            from = %session.state,
            to = %result.new_state,
            effects = result.effects.len(),
            "Transition applied"
        );

        for effect in result.effects {
            self.execute_effect(effect).await;
        }
    }

    async fn commit(&self, result: &TransitionResult) {
        let id = self.session_id;
        match &result.fields {
            FieldsUpdate::Keep => {}
            FieldsUpdate::Set { name, value } => self.store.set_field(id, name, value).await,
            FieldsUpdate::Clear => self.store.clear(id).await,
        }
        self.store.set_state(id, result.new_state).await;
    }

    async fn execute_effect(&self, effect: Effect) {
        let kind = effect.kind();
        let outcome = match effect {
            Effect::SendMessage(message) => self
                .transport
                .send_message(self.session_id.0, &message)
                .await
                .map(|_| ()),
            Effect::EditMessage {
                message,
                text,
                format,
            } => self.transport.edit_message(message, &text, format).await,
            Effect::AnswerCallback { callback_id, text } => {
                self.transport
                    .answer_callback(&callback_id, text.as_deref())
                    .await
            }
            Effect::NotifyOperator { submission } => {
                // Fire and forget: at most once, never retried, never awaited
                let notifier = Arc::clone(&self.notifier);
                let session_id = self.session_id;
                tokio::spawn(async move {
                    match notifier.notify(&submission).await {
                        Ok(()) => {
                            tracing::info!(session_id = %session_id, "Registration handed to operator");
                        }
                        Err(e) => {
                            tracing::error!(session_id = %session_id, error = %e, "Operator notification failed");
                        }
                    }
                });
                return;
            }
        };

        if let Err(e) = outcome {
            tracing::warn!(session_id = %self.session_id, effect = kind, error = %e, "Outbound action failed");
        }
    }
}
