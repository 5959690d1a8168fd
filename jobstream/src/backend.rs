// SPDX-License-Identifier: MIT

//! The capability surface a backing store must provide (§4.1, §9).
//!
//! `Consumer` and `Publisher` depend on this trait, not on the concrete
//! Redis client, so tests can swap in an in-memory fake without a live
//! server — the "duck-typed dependency check" of the original becomes a
//! trait bound here.

use async_trait::async_trait;

use crate::error::StoreClientError;
use crate::message::{JobPayload, MessageId};

/// Connection lifecycle states (§3).
///
/// Transitions: `Disconnected -> Connecting -> Ready -> Closing ->
/// Disconnected`, driven by explicit `connect`/`disconnect` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Ready,
    Closing,
}

/// Where a newly created consumer group should start reading from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAt {
    /// Only messages appended after the group is created are delivered.
    Tail,
}

/// One batch entry returned by `read_group`: the store-assigned id paired
/// with the payload as it was appended.
pub type Delivery = (MessageId, JobPayload);

/// Typed capability surface over a backing log store's consumer-group
/// primitives. See spec §4.1 for the full contract each method must honor.
#[async_trait]
pub trait StoreBackend: Send + Sync + 'static {
    /// Idempotent; collapses concurrent callers into a single attempt.
    async fn connect(&self) -> Result<(), StoreClientError>;

    /// Always succeeds; a no-op if already disconnected.
    async fn disconnect(&self);

    /// Current connection state.
    async fn status(&self) -> ConnectionState;

    /// Append `payload` to `stream`, returning the store-assigned id.
    /// Requires `Ready`.
    async fn append(
        &self,
        stream: &str,
        payload: &JobPayload,
    ) -> Result<MessageId, StoreClientError>;

    /// Ensure `group` exists on `stream`, creating the stream implicitly if
    /// needed. The "already exists" signal is absorbed as success.
    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        start_at: StartAt,
    ) -> Result<(), StoreClientError>;

    /// Blocking read of up to `count` never-before-delivered messages,
    /// waiting up to `block_ms`. Returns empty on timeout.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<Delivery>, StoreClientError>;

    /// Acknowledge `id`, removing it from the group's pending set.
    async fn ack(&self, stream: &str, group: &str, id: &MessageId) -> Result<(), StoreClientError>;

    /// Opaque scalar read, for callers outside the core queue machinery.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreClientError>;

    /// Opaque scalar write, for callers outside the core queue machinery.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreClientError>;
}
