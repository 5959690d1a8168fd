// SPDX-License-Identifier: MIT

//! The poll/dispatch loop (§4.4 `_doPoll`, `dispatchOrdered`,
//! `_executeJob`). Split out of `mod.rs` so the public API surface reads
//! cleanly next to this file's internal machinery.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::StartAt;
use crate::error::StoreClientError;
use crate::message::{ordering_key_of, JobPayload, MessageId};

use super::{ConsumerState, Shared};

pub(super) async fn ensure_group(shared: &Arc<Shared>) -> Result<(), StoreClientError> {
    shared.store.create_group(&shared.stream, &shared.group, StartAt::Tail).await
}

pub(super) fn spawn_loop(shared: Arc<Shared>) {
    tokio::spawn(async move {
        run(shared).await;
    });
}

async fn run(shared: Arc<Shared>) {
    loop {
        if shared.shutdown.is_cancelled() {
            break;
        }

        match poll_once(&shared).await {
            Outcome::ShuttingDown => break,
            // An empty read_group result (timeout) must not change any
            // state; the next poll is scheduled immediately (§4.4, §8).
            Outcome::Empty | Outcome::Delivered => {}
            // The pool is saturated in unordered mode; there is no point
            // issuing another read until a slot frees up.
            Outcome::PoolFull => {
                if wait(&shared, Duration::from_secs(1)).await {
                    break;
                }
            }
            Outcome::StoreError => {
                if wait(&shared, Duration::from_secs(5)).await {
                    break;
                }
            }
        }
    }
}

/// Sleep for `dur` unless shutdown is signaled first. Returns `true` if
/// shutdown won the race.
async fn wait(shared: &Arc<Shared>, dur: Duration) -> bool {
    tokio::select! {
        _ = shared.shutdown.cancelled() => true,
        _ = tokio::time::sleep(dur) => false,
    }
}

enum Outcome {
    Delivered,
    /// `read_group` timed out with nothing to deliver.
    Empty,
    /// Unordered mode and every slot is taken; no read was issued.
    PoolFull,
    StoreError,
    ShuttingDown,
}

async fn poll_once(shared: &Arc<Shared>) -> Outcome {
    let avail = shared.semaphore.available_permits();
    if !shared.options.process_ordered_by_key && avail == 0 {
        return Outcome::PoolFull;
    }

    let fetch_count =
        if shared.options.process_ordered_by_key { shared.options.concurrency } else { avail.max(1) };

    let batch = tokio::select! {
        _ = shared.shutdown.cancelled() => return Outcome::ShuttingDown,
        result = shared.store.read_group(
            &shared.stream,
            &shared.group,
            &shared.consumer_name,
            fetch_count,
            shared.options.block_time_ms,
        ) => result,
    };

    let batch = match batch {
        Ok(batch) => batch,
        Err(e) => {
            tracing::warn!(
                err = %e,
                stream = %shared.stream,
                group = %shared.group,
                "read_group failed; retrying in 5s"
            );
            return Outcome::StoreError;
        }
    };

    if *shared.state.lock().await != ConsumerState::Running {
        // Stopping was signaled while the blocking read was in flight.
        // Leave the batch untouched: every message in it is still pending
        // in the store and will be redelivered.
        return Outcome::ShuttingDown;
    }

    if batch.is_empty() {
        return Outcome::Empty;
    }

    classify_batch(shared, batch).await;

    if shared.options.process_ordered_by_key {
        dispatch_ordered(Arc::clone(shared)).await;
    }

    Outcome::Delivered
}

async fn classify_batch(shared: &Arc<Shared>, batch: Vec<(MessageId, JobPayload)>) {
    for (id, payload) in batch {
        let key = if shared.options.process_ordered_by_key {
            ordering_key_of(&payload).map(str::to_owned)
        } else {
            None
        };

        match key {
            Some(key) => {
                shared.queues.lock().await.push(key, id, payload);
            }
            None => match Arc::clone(&shared.semaphore).try_acquire_owned() {
                Ok(permit) => {
                    let shared = Arc::clone(shared);
                    tokio::spawn(async move {
                        let _permit = permit;
                        execute_job(&shared, id, payload, None).await;
                    });
                }
                Err(_) => {
                    // Pool is full. The remaining messages in this batch
                    // stay unacknowledged in the store's pending set; they
                    // are redelivered on restart or claimed by a peer in
                    // future work (reclaim is explicitly out of scope).
                    break;
                }
            },
        }
    }
}

/// Admit as many FIFO-ready keys as there are free slots. Called after
/// classifying a batch, and again every time a keyed handler finishes, so
/// a freed slot is never left idle while some key has work (§4.4).
async fn dispatch_ordered(shared: Arc<Shared>) {
    loop {
        let permit = match Arc::clone(&shared.semaphore).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let next = shared.queues.lock().await.pop_ready();
        let Some((key, id, payload)) = next else {
            drop(permit);
            break;
        };

        let shared_for_task = Arc::clone(&shared);
        tokio::spawn(async move {
            // The permit must be dropped before the tail call below: the
            // freed slot has to be visible to `try_acquire_owned` inside
            // the recursive `dispatch_ordered`, or a saturated pool (e.g.
            // concurrency == 1) can never admit this key's next message.
            {
                let _permit = permit;
                execute_job(&shared_for_task, id, payload, Some(key.clone())).await;
            }
            shared_for_task.queues.lock().await.release(&key);
            dispatch_ordered(shared_for_task.clone()).await;
        });
    }
}

async fn execute_job(
    shared: &Arc<Shared>,
    id: MessageId,
    payload: JobPayload,
    key: Option<String>,
) {
    let result = (shared.handler)(payload, id.clone(), shared.shutdown.clone()).await;

    match result {
        Ok(()) => {
            if let Err(e) = shared.store.ack(&shared.stream, &shared.group, &id).await {
                tracing::error!(
                    err = %e,
                    message_id = %id,
                    stream = %shared.stream,
                    "ack failed after successful handler run; message will be redelivered"
                );
            }
        }
        Err(e) => {
            tracing::warn!(
                err = %e,
                message_id = %id,
                key = ?key,
                stream = %shared.stream,
                "handler failed; message left unacknowledged"
            );
        }
    }
}
