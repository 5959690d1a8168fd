// SPDX-License-Identifier: MIT

//! In-memory [`StoreBackend`] for Consumer/Publisher unit tests. Enough of
//! the consumer-group contract (append order, tail start, pending-until-ack)
//! to exercise §8's invariants without a live Redis.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::backend::{ConnectionState, Delivery, StartAt, StoreBackend};
use crate::error::StoreClientError;
use crate::message::{JobPayload, MessageId};

#[derive(Default)]
struct State {
    status: ConnectionState,
    streams: HashMap<String, Vec<(MessageId, JobPayload)>>,
    groups: HashSet<(String, String)>,
    cursors: HashMap<(String, String), usize>,
    pending: HashSet<(String, String, MessageId)>,
    kv: HashMap<String, String>,
    next_id: u64,
}

pub(crate) struct FakeStoreClient {
    state: Mutex<State>,
    appended: Notify,
}

impl FakeStoreClient {
    pub(crate) fn new() -> Self {
        Self { state: Mutex::new(State::default()), appended: Notify::new() }
    }
}

#[async_trait]
impl StoreBackend for FakeStoreClient {
    async fn connect(&self) -> Result<(), StoreClientError> {
        self.state.lock().await.status = ConnectionState::Ready;
        Ok(())
    }

    async fn disconnect(&self) {
        self.state.lock().await.status = ConnectionState::Disconnected;
    }

    async fn status(&self) -> ConnectionState {
        self.state.lock().await.status
    }

    async fn append(
        &self,
        stream: &str,
        payload: &JobPayload,
    ) -> Result<MessageId, StoreClientError> {
        let mut guard = self.state.lock().await;
        if guard.status != ConnectionState::Ready {
            return Err(StoreClientError::NotReady(guard.status));
        }
        guard.next_id += 1;
        let id = MessageId(format!("{}-0", guard.next_id));
        guard.streams.entry(stream.to_owned()).or_default().push((id.clone(), payload.clone()));
        drop(guard);
        self.appended.notify_waiters();
        Ok(id)
    }

    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        start_at: StartAt,
    ) -> Result<(), StoreClientError> {
        let StartAt::Tail = start_at;
        let mut guard = self.state.lock().await;
        let key = (stream.to_owned(), group.to_owned());
        if guard.groups.contains(&key) {
            return Ok(());
        }
        let tail = guard.streams.get(stream).map(Vec::len).unwrap_or(0);
        guard.groups.insert(key.clone());
        guard.cursors.insert(key, tail);
        Ok(())
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        _consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<Delivery>, StoreClientError> {
        let key = (stream.to_owned(), group.to_owned());
        let deadline = tokio::time::sleep(Duration::from_millis(block_ms));
        tokio::pin!(deadline);

        loop {
            {
                let mut guard = self.state.lock().await;
                if guard.status != ConnectionState::Ready {
                    return Err(StoreClientError::NotReady(guard.status));
                }
                let cursor = *guard.cursors.get(&key).unwrap_or(&0);
                let len = guard.streams.get(stream).map(Vec::len).unwrap_or(0);
                if cursor < len {
                    let batch: Vec<_> = guard.streams[stream][cursor..]
                        .iter()
                        .take(count.max(1))
                        .cloned()
                        .collect();
                    let new_cursor = cursor + batch.len();
                    guard.cursors.insert(key.clone(), new_cursor);
                    for (id, _) in &batch {
                        guard.pending.insert((stream.to_owned(), group.to_owned(), id.clone()));
                    }
                    return Ok(batch);
                }
            }

            let notified = self.appended.notified();
            tokio::select! {
                _ = notified => continue,
                _ = &mut deadline => return Ok(Vec::new()),
            }
        }
    }

    async fn ack(&self, stream: &str, group: &str, id: &MessageId) -> Result<(), StoreClientError> {
        let mut guard = self.state.lock().await;
        guard.pending.remove(&(stream.to_owned(), group.to_owned(), id.clone()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreClientError> {
        Ok(self.state.lock().await.kv.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreClientError> {
        self.state.lock().await.kv.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[cfg(test)]
impl FakeStoreClient {
    /// Number of messages delivered-but-unacked for `(stream, group)`. Used
    /// by tests asserting a failed handler never acks (§8 S2).
    pub(crate) async fn pending_count(&self, stream: &str, group: &str) -> usize {
        let guard = self.state.lock().await;
        guard.pending.iter().filter(|(s, g, _)| s == stream && g == group).count()
    }
}
