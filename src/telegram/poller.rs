//! Long-polling update loop

use super::client::{TelegramClient, LONG_POLL_TIMEOUT_SECS};
use super::error::TelegramError;
use super::inbound::{translate, Inbound};
use super::types::{AnswerCallbackQueryRequest, BotCommand};
use crate::runtime::{Dispatcher, OperatorNotifier, SessionStore, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Drop any webhook (and the updates queued behind it) and publish the command menu
pub async fn prepare(client: &TelegramClient) -> Result<(), TelegramError> {
    client.delete_webhook(true).await?;
    client
        .set_my_commands(vec![
            BotCommand {
                command: "start".to_string(),
                description: "Restart the bot".to_string(),
            },
            BotCommand {
                command: "register".to_string(),
                description: "Fill in the registration form".to_string(),
            },
        ])
        .await?;
    tracing::info!("Webhook removed, commands registered");
    Ok(())
}

/// Pulls updates and feeds them to the dispatcher until cancelled
pub struct Poller<S, T, N>
where
    S: SessionStore + 'static,
    T: Transport + 'static,
    N: OperatorNotifier + 'static,
{
    client: Arc<TelegramClient>,
    dispatcher: Arc<Dispatcher<S, T, N>>,
    start_label: String,
}

impl<S, T, N> Poller<S, T, N>
where
    S: SessionStore + 'static,
    T: Transport + 'static,
    N: OperatorNotifier + 'static,
{
    pub fn new(
        client: Arc<TelegramClient>,
        dispatcher: Arc<Dispatcher<S, T, N>>,
        start_label: impl Into<String>,
    ) -> Self {
        Self {
            client,
            dispatcher,
            start_label: start_label.into(),
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut offset: Option<i64> = None;
        let mut backoff = INITIAL_BACKOFF;

        tracing::info!("Polling for updates");
        loop {
            let result = tokio::select! {
                result = self.client.get_updates(offset, LONG_POLL_TIMEOUT_SECS) => result,
                () = shutdown.cancelled() => break,
            };

            match result {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.route(update).await;
                    }
                }
                Err(e) => {
                    let delay = e.retry_after.unwrap_or(backoff);
                    if e.kind.is_retryable() {
                        tracing::warn!(error = %e, delay_secs = delay.as_secs(), "getUpdates failed, retrying");
                    } else {
                        tracing::error!(error = %e, delay_secs = delay.as_secs(), "getUpdates rejected, retrying");
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = shutdown.cancelled() => break,
                    }
                }
            }
        }
        tracing::info!("Polling stopped");
    }

    async fn route(&self, update: super::types::Update) {
        let update_id = update.update_id;
        match translate(update, &self.start_label) {
            Some(Inbound::Dispatch { session_id, event }) => {
                tracing::debug!(update_id, %session_id, event = event.kind(), "Dispatching update");
                self.dispatcher.dispatch(session_id, event).await;
            }
            Some(Inbound::Acknowledge { callback_id }) => {
                let request = AnswerCallbackQueryRequest {
                    callback_query_id: callback_id,
                    text: None,
                };
                if let Err(e) = self.client.answer_callback_query(&request).await {
                    tracing::warn!(update_id, error = %e, "Failed to answer stray callback");
                }
            }
            None => tracing::trace!(update_id, "Ignoring update"),
        }
    }
}
