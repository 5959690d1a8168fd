// SPDX-License-Identifier: MIT

//! Construction options for [`super::Consumer`] (§4.4's table).

use std::time::Duration;

/// Tuning knobs for a [`super::Consumer`]. All fields have spec-mandated
/// defaults; use [`ConsumerOptions::default`] and override individual
/// fields.
#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    /// Upper bound on in-flight handler invocations. Values below 1 (or
    /// absent) are coerced to 1, with a warning logged at construction.
    pub concurrency: usize,

    /// Enables the per-key serializer for messages carrying `_orderingKey`.
    pub process_ordered_by_key: bool,

    /// Consumer group name. Defaults to `group:<stream>` at construction.
    pub group_name: Option<String>,

    /// Consumer identity, unique within its group. Defaults to
    /// `consumer:<stream>-<pid>-<now_ms>` at construction.
    pub consumer_name: Option<String>,

    /// Max blocking time per `read_group` call.
    pub block_time_ms: u64,

    /// Max wait for in-flight drain on `stop`.
    pub graceful_shutdown_timeout_ms: u64,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            process_ordered_by_key: false,
            group_name: None,
            consumer_name: None,
            block_time_ms: 5000,
            graceful_shutdown_timeout_ms: 30_000,
        }
    }
}

impl ConsumerOptions {
    pub(crate) fn graceful_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_shutdown_timeout_ms)
    }
}
