// SPDX-License-Identifier: MIT

//! Error taxonomy for the store client, publisher, and consumer.
//!
//! Kinds map directly onto the failure domains a caller needs to branch on:
//! a bad argument never touches the network, a `NotReady`/`NotConnected`
//! means the caller raced a connection that isn't up yet, and `Store`
//! wraps whatever the backing driver returned.

use thiserror::Error;

use crate::backend::ConnectionState;

/// Failures from the store client capability surface (§4.1).
#[derive(Debug, Error)]
pub enum StoreClientError {
    /// `append`/`read_group`/`ack` called before `connect()` was ever invoked.
    #[error("store client is not connected")]
    NotConnected,

    /// An operation requiring `Ready` was attempted in another state.
    #[error("store client is not ready (current state: {0:?})")]
    NotReady(ConnectionState),

    /// The connect handshake failed (timeout, auth, or transport error).
    #[error("failed to connect to backing store: {0}")]
    Connect(#[source] redis::RedisError),

    /// Any other failure surfaced by the backing store during an operation.
    #[error("backing store error: {0}")]
    Store(#[source] redis::RedisError),
}

impl StoreClientError {
    /// True for the driver's "consumer group already exists" signal, which
    /// `create_group` absorbs as success rather than propagating.
    pub(crate) fn is_group_exists(err: &redis::RedisError) -> bool {
        err.to_string().contains("BUSYGROUP")
    }
}

/// Failures from [`crate::Publisher::publish`].
#[derive(Debug, Error)]
pub enum PublishError {
    /// Validation failed before any store I/O was attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying `append` call failed.
    #[error(transparent)]
    Store(#[from] StoreClientError),
}

/// Failures constructing a [`crate::Consumer`].
#[derive(Debug, Error)]
pub enum ConsumerBuildError {
    /// A required constructor input was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Failures from [`crate::Consumer::start`].
#[derive(Debug, Error)]
pub enum StartError {
    /// `create_group` failed with something other than "already exists".
    #[error("failed to create consumer group: {0}")]
    GroupCreate(#[source] StoreClientError),
}

/// The error a user-supplied handler returns. Any `std::error::Error` works;
/// the consumer only logs it and withholds the ack (§7 `HandlerError`).
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;
