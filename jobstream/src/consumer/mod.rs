// SPDX-License-Identifier: MIT

//! The core engine (§4.4): poll loop, concurrency semaphore, per-key
//! serializer, handler invocation, acknowledgment, and graceful shutdown.

mod ordering;
mod options;
mod poll;

pub use options::ConsumerOptions;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backend::StoreBackend;
use crate::error::{ConsumerBuildError, HandlerError};
use crate::message::{JobPayload, MessageId};
use ordering::KeyQueues;

/// The future a handler returns.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// A user-supplied handler. Receives the payload, the store-assigned id,
/// and the consumer's own shutdown token (a forward-compatible addition
/// noted in spec §9 — nothing cancels the handler's future on its behalf;
/// the handler may poll the token to cooperate with shutdown).
pub type Handler = Arc<dyn Fn(JobPayload, MessageId, CancellationToken) -> HandlerFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConsumerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

struct Shared {
    store: Arc<dyn StoreBackend>,
    stream: String,
    group: String,
    consumer_name: String,
    options: ConsumerOptions,
    handler: Handler,
    semaphore: Arc<Semaphore>,
    queues: Mutex<KeyQueues>,
    state: Mutex<ConsumerState>,
    shutdown: CancellationToken,
}

/// End-to-end at-least-once consumption of one stream, with optional
/// per-key ordering and cooperative graceful shutdown (spec §4.4).
pub struct Consumer {
    shared: Arc<Shared>,
}

fn default_consumer_name(stream: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    // A monotonic counter breaks ties when two consumers start within the
    // same millisecond on the same pid (e.g. in tests).
    let salt = COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    format!("consumer:{stream}-{}-{now_ms}-{salt}", std::process::id())
}

impl Consumer {
    /// Build a consumer for `stream`, invoking `handler` for each delivered
    /// message. Fails `InvalidArgument` if `stream` is empty after
    /// trimming; `concurrency < 1` is coerced to 1 with a warning rather
    /// than rejected (§4.4's table).
    pub fn new<F, Fut>(
        store: Arc<dyn StoreBackend>,
        stream: impl Into<String>,
        handler: F,
        mut options: ConsumerOptions,
    ) -> Result<Self, ConsumerBuildError>
    where
        F: Fn(JobPayload, MessageId, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let stream = stream.into().trim().to_owned();
        if stream.is_empty() {
            return Err(ConsumerBuildError::InvalidArgument("stream name must not be empty".into()));
        }

        if options.concurrency < 1 {
            tracing::warn!(stream = %stream, requested = options.concurrency, "concurrency < 1; coercing to 1");
            options.concurrency = 1;
        }

        let group = options.group_name.clone().unwrap_or_else(|| format!("group:{stream}"));
        let consumer_name =
            options.consumer_name.clone().unwrap_or_else(|| default_consumer_name(&stream));

        let handler: Handler = Arc::new(move |payload, id, token| Box::pin(handler(payload, id, token)));

        let shared = Arc::new(Shared {
            store,
            semaphore: Arc::new(Semaphore::new(options.concurrency)),
            group,
            consumer_name,
            stream,
            options,
            handler,
            queues: Mutex::new(KeyQueues::new()),
            state: Mutex::new(ConsumerState::Idle),
            shutdown: CancellationToken::new(),
        });

        Ok(Self { shared })
    }

    /// The consumer group name this consumer reads from.
    pub fn group_name(&self) -> &str {
        &self.shared.group
    }

    /// This consumer's identity within its group.
    pub fn consumer_name(&self) -> &str {
        &self.shared.consumer_name
    }

    /// Ensure the consumer group exists and start the poll loop. Only
    /// valid from `Idle`; calling it again from `Stopping`/`Stopped` is a
    /// no-op with a warning (§4.4's state table).
    pub async fn start(&self) -> Result<(), crate::error::StartError> {
        {
            let mut state = self.shared.state.lock().await;
            if *state != ConsumerState::Idle {
                tracing::warn!(
                    stream = %self.shared.stream,
                    state = ?*state,
                    "start() is only valid from Idle; ignoring"
                );
                return Ok(());
            }
            *state = ConsumerState::Running;
        }

        if let Err(e) = poll::ensure_group(&self.shared).await {
            *self.shared.state.lock().await = ConsumerState::Idle;
            return Err(crate::error::StartError::GroupCreate(e));
        }

        poll::spawn_loop(Arc::clone(&self.shared));
        Ok(())
    }

    /// Cooperative shutdown (§4.4): stop scheduling new reads, drain
    /// in-flight handlers up to `graceful_shutdown_timeout_ms`, then
    /// transition to `Stopped`. Idempotent.
    pub async fn stop(&self) {
        {
            let mut state = self.shared.state.lock().await;
            match *state {
                ConsumerState::Stopping | ConsumerState::Stopped => return,
                _ => *state = ConsumerState::Stopping,
            }
        }

        self.shared.shutdown.cancel();

        let deadline = Instant::now() + self.shared.options.graceful_shutdown_timeout();
        loop {
            if self.shared.semaphore.available_permits() == self.shared.options.concurrency {
                break;
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    stream = %self.shared.stream,
                    "graceful shutdown timed out with handlers still in flight; proceeding anyway"
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        if self.shared.options.process_ordered_by_key {
            let remaining = self.shared.queues.lock().await.queued_len();
            if remaining > 0 {
                tracing::warn!(
                    stream = %self.shared.stream,
                    remaining,
                    "batched messages were never dispatched; they remain pending in the store"
                );
            }
        }

        *self.shared.state.lock().await = ConsumerState::Stopped;
    }

    #[cfg(test)]
    pub(crate) async fn state(&self) -> ConsumerState {
        *self.shared.state.lock().await
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.shared.options.concurrency - self.shared.semaphore.available_permits()
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
