// SPDX-License-Identifier: MIT

//! The per-key serializer state of §3/§4.4: a FIFO per ordering key plus a
//! "busy" set gating dispatch.
//!
//! Two independent structures, not one: `queues` holds only keys with
//! outstanding, undispatched messages (a key is dropped from it the instant
//! its FIFO empties); `busy` holds keys whose dispatched message hasn't
//! finished yet. A key can be busy with an empty (and therefore absent)
//! queue entry — that's the normal state right after dispatch.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;

use crate::message::{JobPayload, MessageId};

type Fifo = VecDeque<(MessageId, JobPayload)>;

#[derive(Default)]
pub(crate) struct KeyQueues {
    queues: IndexMap<String, Fifo>,
    busy: HashSet<String>,
}

impl KeyQueues {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append to `key`'s FIFO, preserving arrival order (§3 invariant ii).
    pub(crate) fn push(&mut self, key: String, id: MessageId, payload: JobPayload) {
        self.queues.entry(key).or_default().push_back((id, payload));
    }

    /// Pop the head of the first (in mapping order) key that has messages
    /// and isn't busy, marking it busy. `None` if no key is eligible.
    pub(crate) fn pop_ready(&mut self) -> Option<(String, MessageId, JobPayload)> {
        let key = self
            .queues
            .iter()
            .find(|(key, fifo)| !fifo.is_empty() && !self.busy.contains(key.as_str()))
            .map(|(key, _)| key.clone())?;

        self.busy.insert(key.clone());
        let fifo = self.queues.get_mut(&key)?;
        let entry = fifo.pop_front()?;
        if fifo.is_empty() {
            self.queues.shift_remove(&key);
        }
        Some((key, entry.0, entry.1))
    }

    /// Mark `key`'s in-flight handler as finished, making it eligible for
    /// dispatch again on the next `pop_ready` call.
    pub(crate) fn release(&mut self, key: &str) {
        self.busy.remove(key);
    }

    /// Total messages still queued (not yet dispatched) across all keys.
    /// Used by `stop()` to report what's left pending in the store (§4.4
    /// step 4 of shutdown).
    pub(crate) fn queued_len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(n: u64) -> (MessageId, JobPayload) {
        (MessageId(format!("{n}-0")), JobPayload::new())
    }

    #[test]
    fn fifo_order_preserved_per_key() -> Result<(), String> {
        let mut q = KeyQueues::new();
        let (id1, p1) = job(1);
        let (id2, p2) = job(2);
        q.push("A".into(), id1.clone(), p1);
        q.push("A".into(), id2.clone(), p2);

        let Some((key, id, _)) = q.pop_ready() else {
            return Err("expected first A message to be ready".into());
        };
        assert_eq!(key, "A");
        assert_eq!(id, id1);

        // A is now busy; its second message must not dispatch yet.
        assert!(q.pop_ready().is_none());

        q.release("A");
        let Some((key, id, _)) = q.pop_ready() else {
            return Err("expected second A message to be ready after release".into());
        };
        assert_eq!(key, "A");
        assert_eq!(id, id2);
        Ok(())
    }

    #[test]
    fn different_keys_dispatch_independently() -> Result<(), String> {
        let mut q = KeyQueues::new();
        let (id_a, p_a) = job(1);
        let (id_b, p_b) = job(2);
        q.push("A".into(), id_a, p_a);
        q.push("B".into(), id_b, p_b);

        let Some((key1, _, _)) = q.pop_ready() else {
            return Err("expected A to be ready".into());
        };
        assert_eq!(key1, "A");
        let Some((key2, _, _)) = q.pop_ready() else {
            return Err("expected B to be ready even though A is busy".into());
        };
        assert_eq!(key2, "B");
        Ok(())
    }

    #[test]
    fn empty_key_is_removed_from_mapping() {
        let mut q = KeyQueues::new();
        let (id, p) = job(1);
        q.push("A".into(), id, p);
        q.pop_ready();
        assert_eq!(q.queued_len(), 0);
        assert!(!q.queues.contains_key("A"));
    }
}
