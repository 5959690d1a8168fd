// SPDX-License-Identifier: MIT

//! The production [`StoreBackend`]: a single logical connection to Redis,
//! driven through an explicit connect/disconnect state machine (§3, §4.1).

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::backend::{ConnectionState, Delivery, StartAt, StoreBackend};
use crate::error::StoreClientError;
use crate::message::{JobPayload, MessageId};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

struct Inner {
    state: ConnectionState,
    conn: Option<MultiplexedConnection>,
}

/// A single-connection Redis client. Connect attempts serialize on an
/// internal mutex, which is what collapses concurrent `connect()` callers
/// into one handshake (§4.1): the second caller blocks until the first
/// finishes, then observes `Ready` and returns immediately.
pub struct RedisStoreClient {
    url: String,
    inner: Mutex<Inner>,
}

impl RedisStoreClient {
    /// Build a client for `url` (e.g. `redis://127.0.0.1:6379/0`). Does not
    /// connect; call [`StoreBackend::connect`] first.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            inner: Mutex::new(Inner { state: ConnectionState::Disconnected, conn: None }),
        }
    }

    /// The underlying multiplexed connection, if currently `Ready`. For
    /// operations this wrapper does not cover.
    pub async fn raw_handle(&self) -> Option<MultiplexedConnection> {
        let guard = self.inner.lock().await;
        guard.conn.clone()
    }

    async fn ready_connection(&self) -> Result<MultiplexedConnection, StoreClientError> {
        let guard = self.inner.lock().await;
        match (guard.state, &guard.conn) {
            (ConnectionState::Ready, Some(conn)) => Ok(conn.clone()),
            (ConnectionState::Disconnected, _) => Err(StoreClientError::NotConnected),
            (other, _) => Err(StoreClientError::NotReady(other)),
        }
    }
}

#[async_trait]
impl StoreBackend for RedisStoreClient {
    async fn connect(&self) -> Result<(), StoreClientError> {
        let mut guard = self.inner.lock().await;
        if guard.state == ConnectionState::Ready {
            return Ok(());
        }

        guard.state = ConnectionState::Connecting;
        guard.conn = None;

        let client = redis::Client::open(self.url.as_str()).map_err(StoreClientError::Connect)?;
        let attempt =
            tokio::time::timeout(CONNECT_TIMEOUT, client.get_multiplexed_async_connection()).await;

        let conn = match attempt {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                guard.state = ConnectionState::Disconnected;
                return Err(StoreClientError::Connect(e));
            }
            Err(_elapsed) => {
                guard.state = ConnectionState::Disconnected;
                let timeout_err =
                    redis::RedisError::from((redis::ErrorKind::IoError, "connect handshake timed out"));
                return Err(StoreClientError::Connect(timeout_err));
            }
        };

        guard.conn = Some(conn);
        guard.state = ConnectionState::Ready;
        tracing::info!(url = %self.url, "store client connected");
        Ok(())
    }

    async fn disconnect(&self) {
        let mut guard = self.inner.lock().await;
        if guard.state == ConnectionState::Disconnected {
            return;
        }
        guard.state = ConnectionState::Closing;
        // Dropping the multiplexed connection closes its socket; there is no
        // separate polite-quit command worth sending for a pipelined client.
        guard.conn = None;
        guard.state = ConnectionState::Disconnected;
        tracing::info!("store client disconnected");
    }

    async fn status(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    async fn append(
        &self,
        stream: &str,
        payload: &JobPayload,
    ) -> Result<MessageId, StoreClientError> {
        let mut conn = self.ready_connection().await?;
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("*");
        for (field, value) in payload {
            cmd.arg(field).arg(value);
        }
        let id: String = cmd.query_async(&mut conn).await.map_err(StoreClientError::Store)?;
        Ok(MessageId(id))
    }

    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        start_at: StartAt,
    ) -> Result<(), StoreClientError> {
        let StartAt::Tail = start_at;
        let mut conn = self.ready_connection().await?;
        let result: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) if StoreClientError::is_group_exists(&e) => Ok(()),
            Err(e) => Err(StoreClientError::Store(e)),
        }
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<Delivery>, StoreClientError> {
        let mut conn = self.ready_connection().await?;
        let opts = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block_ms as usize);

        let reply: StreamReadReply = conn
            .xread_options(&[stream], &[">"], &opts)
            .await
            .map_err(StoreClientError::Store)?;

        let mut out = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                let mut payload = JobPayload::new();
                for (field, value) in entry.map {
                    let value: String = redis::from_redis_value(&value).unwrap_or_default();
                    payload.insert(field, value);
                }
                out.push((MessageId(entry.id), payload));
            }
        }
        Ok(out)
    }

    async fn ack(&self, stream: &str, group: &str, id: &MessageId) -> Result<(), StoreClientError> {
        let mut conn = self.ready_connection().await?;
        let _: i64 = conn.xack(stream, group, &[id.0.as_str()]).await.map_err(StoreClientError::Store)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreClientError> {
        let mut conn = self.ready_connection().await?;
        let value: Option<String> = conn.get(key).await.map_err(StoreClientError::Store)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreClientError> {
        let mut conn = self.ready_connection().await?;
        let _: () = conn.set(key, value).await.map_err(StoreClientError::Store)?;
        Ok(())
    }
}
