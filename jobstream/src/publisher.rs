// SPDX-License-Identifier: MIT

//! Thin producer: validates inputs, optionally tags the payload with an
//! ordering key, and delegates the append to the shared store (§4.3).

use std::sync::Arc;

use crate::error::PublishError;
use crate::message::{JobPayload, MessageId, ORDERING_KEY_FIELD};
use crate::store::SharedStore;

/// Options accepted by [`Publisher::publish`].
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Ordering key to inject into the payload. Trimmed; empty after
    /// trimming is treated as absent.
    pub ordering_key: Option<String>,
}

/// Validates and tags outgoing work items, then appends them through a
/// [`SharedStore`].
pub struct Publisher {
    store: Arc<SharedStore>,
}

impl Publisher {
    pub fn new(store: Arc<SharedStore>) -> Self {
        Self { store }
    }

    /// Publish `payload` to `stream`. Fails `InvalidArgument` before any
    /// store I/O if `stream` is empty (after trimming) or `payload` is
    /// empty. Never mutates the caller's `payload` (§8 property 5).
    pub async fn publish(
        &self,
        stream: &str,
        payload: &JobPayload,
        options: PublishOptions,
    ) -> Result<MessageId, PublishError> {
        let stream = stream.trim();
        if stream.is_empty() {
            return Err(PublishError::InvalidArgument("stream name must not be empty".into()));
        }
        if payload.is_empty() {
            return Err(PublishError::InvalidArgument(
                "payload must be a non-empty structured record".into(),
            ));
        }

        let mut outgoing = payload.clone();
        if let Some(key) = options.ordering_key.as_deref().map(str::trim) {
            if !key.is_empty() {
                outgoing.insert(ORDERING_KEY_FIELD.to_owned(), key.to_owned());
            }
        }

        let id = self.store.append(stream, &outgoing).await?;
        tracing::debug!(stream, message_id = %id, "published job");
        Ok(id)
    }
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
