// SPDX-License-Identifier: MIT

//! One process-wide store handle, lazily (re)connected (§4.2).

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::backend::{ConnectionState, Delivery, StartAt, StoreBackend};
use crate::config::StoreConfig;
use crate::error::StoreClientError;
use crate::message::{JobPayload, MessageId};
use crate::store::client::RedisStoreClient;

struct Inner {
    client: Option<Arc<dyn StoreBackend>>,
    config: Option<StoreConfig>,
}

/// Owns exactly one store client at a time, behind the [`StoreBackend`]
/// capability trait. `Consumer` and `Publisher` hold a non-owning
/// `Arc<SharedStore>`/`Arc<dyn StoreBackend>` and never construct a client
/// directly (§3's ownership note).
pub struct SharedStore {
    inner: Mutex<Inner>,
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { client: None, config: None }) }
    }

    /// Wrap an already-constructed backend, bypassing config-driven
    /// connection entirely. Used by tests to plug in an in-memory fake.
    #[cfg(test)]
    pub(crate) fn from_client(client: Arc<dyn StoreBackend>) -> Self {
        Self { inner: Mutex::new(Inner { client: Some(client), config: None }) }
    }

    /// Connect (or reconnect) using `config`. Equal, already-`Ready`
    /// configuration is a no-op; equal, in-flight configuration awaits the
    /// existing attempt; different configuration tears down the old client
    /// and builds a new one. Concurrent callers serialize on the internal
    /// mutex, which is what collapses them into a single connection
    /// attempt when the configuration matches (§4.2, §8 property 6).
    pub async fn connect(&self, config: StoreConfig) -> Result<(), StoreClientError> {
        let mut guard = self.inner.lock().await;

        if let (Some(existing), Some(current)) = (&guard.client, &guard.config) {
            if *current == config {
                match existing.status().await {
                    ConnectionState::Ready | ConnectionState::Connecting => return Ok(()),
                    _ => {}
                }
            } else {
                existing.disconnect().await;
                guard.client = None;
                guard.config = None;
            }
        }

        let client: Arc<dyn StoreBackend> = match guard.client.take() {
            Some(existing) => existing,
            None => Arc::new(RedisStoreClient::new(config.redis_url())),
        };
        client.connect().await?;
        guard.client = Some(client);
        guard.config = Some(config);
        Ok(())
    }

    /// Tear down the current client and forget the cached configuration.
    pub async fn disconnect(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(client) = guard.client.take() {
            client.disconnect().await;
        }
        guard.config = None;
    }

    /// The current client, or `NotConnected` if `connect` was never called.
    /// The application shell uses this to hand a `Consumer` its store
    /// client directly, per §4.4's constructor taking `storeClient` rather
    /// than `SharedStore`.
    pub async fn client(&self) -> Result<Arc<dyn StoreBackend>, StoreClientError> {
        let guard = self.inner.lock().await;
        guard.client.clone().ok_or(StoreClientError::NotConnected)
    }

    async fn ensure_ready(&self) -> Result<Arc<dyn StoreBackend>, StoreClientError> {
        let client = self.client().await?;
        match client.status().await {
            ConnectionState::Ready => Ok(client),
            other => Err(StoreClientError::NotReady(other)),
        }
    }

    pub async fn append(
        &self,
        stream: &str,
        payload: &JobPayload,
    ) -> Result<MessageId, StoreClientError> {
        self.ensure_ready().await?.append(stream, payload).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreClientError> {
        self.ensure_ready().await?.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreClientError> {
        self.ensure_ready().await?.set(key, value).await
    }

    pub async fn create_group(
        &self,
        stream: &str,
        group: &str,
        start_at: StartAt,
    ) -> Result<(), StoreClientError> {
        self.ensure_ready().await?.create_group(stream, group, start_at).await
    }

    pub async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<Delivery>, StoreClientError> {
        self.ensure_ready().await?.read_group(stream, group, consumer, count, block_ms).await
    }

    pub async fn ack(
        &self,
        stream: &str,
        group: &str,
        id: &MessageId,
    ) -> Result<(), StoreClientError> {
        self.ensure_ready().await?.ack(stream, group, id).await
    }
}

#[cfg(test)]
#[path = "shared_tests.rs"]
mod tests;
