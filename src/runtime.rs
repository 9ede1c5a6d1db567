//! Runtime for executing registration conversations
//!
//! Inbound events are routed to one worker per session. Workers are created on
//! the first event for a session and stop after a quiet period; the session
//! itself lives on in the store until it is cleared or evicted.

mod executor;
pub mod store;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use store::{InMemorySessionStore, SessionStore};
pub use traits::*;

use crate::state_machine::{Event, RegContext, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// How long a worker waits for its next event before shutting down
pub const DEFAULT_WORKER_IDLE: Duration = Duration::from_secs(300);

/// Live workers by session. Senders only push while holding the read lock.
pub(crate) type WorkerRegistry = Arc<RwLock<HashMap<SessionId, mpsc::UnboundedSender<Event>>>>;

/// Routes events to per-session workers
pub struct Dispatcher<S, T, N>
where
    S: SessionStore + 'static,
    T: Transport + 'static,
    N: OperatorNotifier + 'static,
{
    context: Arc<RegContext>,
    store: Arc<S>,
    transport: Arc<T>,
    notifier: Arc<N>,
    workers: WorkerRegistry,
    worker_idle: Duration,
}

impl<S, T, N> Dispatcher<S, T, N>
where
    S: SessionStore + 'static,
    T: Transport + 'static,
    N: OperatorNotifier + 'static,
{
    pub fn new(context: RegContext, store: Arc<S>, transport: Arc<T>, notifier: Arc<N>) -> Self {
        Self {
            context: Arc::new(context),
            store,
            transport,
            notifier,
            workers: Arc::new(RwLock::new(HashMap::new())),
            worker_idle: DEFAULT_WORKER_IDLE,
        }
    }

    #[must_use]
    pub fn with_worker_idle(mut self, idle: Duration) -> Self {
        self.worker_idle = idle;
        self
    }

    /// Queue an event for its session, starting a worker if none is running
    pub async fn dispatch(&self, session_id: SessionId, event: Event) {
        let event = {
            let workers = self.workers.read().await;
            match workers.get(&session_id) {
                Some(tx) => match tx.send(event) {
                    Ok(()) => return,
                    Err(mpsc::error::SendError(event)) => event,
                },
                None => event,
            }
        };

        let mut workers = self.workers.write().await;
        // Someone may have started the worker while we waited for the lock
        let event = match workers.get(&session_id) {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(event).is_err() {
            return;
        }

        let runtime = SessionRuntime::new(
            session_id,
            Arc::clone(&self.context),
            Arc::clone(&self.store),
            Arc::clone(&self.transport),
            Arc::clone(&self.notifier),
            rx,
            Arc::clone(&self.workers),
            self.worker_idle,
        );
        workers.insert(session_id, tx);
        drop(workers);

        tokio::spawn(runtime.run());
    }

    /// Number of sessions with a running worker
    #[allow(dead_code)] // Inspection helper for tests and diagnostics
    pub async fn active_workers(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Periodically evict sessions idle for longer than `max_idle`
    pub fn spawn_sweeper(&self, max_idle: Duration, shutdown: CancellationToken) {
        let store = Arc::clone(&self.store);
        let period = (max_idle / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = store.evict_idle(max_idle).await;
                        if evicted > 0 {
                            tracing::info!(evicted, "Evicted idle sessions");
                        }
                    }
                    () = shutdown.cancelled() => break,
                }
            }
        });
    }
}
