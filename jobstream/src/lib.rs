// SPDX-License-Identifier: MIT

//! Durable, ordered, at-least-once work items over a Redis-Streams-shaped
//! backing store.
//!
//! [`Publisher`] appends work items to a stream; [`Consumer`] reads them
//! through a consumer group, dispatches to a handler under bounded
//! concurrency (optionally preserving per-key FIFO order), and acknowledges
//! only on success. [`SharedStore`] owns the single logical connection both
//! sides depend on.
//!
//! Pending-message reclaim (`XCLAIM`/`XPENDING`), exactly-once delivery, and
//! dead-letter queues are out of scope — see each module's docs for what is
//! and isn't covered.

pub mod backend;
pub mod config;
mod consumer;
pub mod error;
mod message;
mod publisher;
mod store;

pub use backend::{ConnectionState, StartAt, StoreBackend};
pub use config::{Config, StoreConfig};
pub use consumer::{Consumer, ConsumerOptions, Handler, HandlerFuture};
pub use error::{ConsumerBuildError, HandlerError, PublishError, StartError, StoreClientError};
pub use message::{JobPayload, MessageId, ORDERING_KEY_FIELD};
pub use publisher::{PublishOptions, Publisher};
pub use store::{RedisStoreClient, SharedStore};
