// SPDX-License-Identifier: MIT

//! The data model of §3: a flat payload keyed by short field names, plus the
//! opaque id the store assigns on append.

use indexmap::IndexMap;

/// Reserved payload field that marks an item as carrying an ordering key.
/// Consumers must not treat any other underscore-prefixed field specially.
pub const ORDERING_KEY_FIELD: &str = "_orderingKey";

/// A flat, ordered map of field name to value. Field order is preserved
/// because `StoreClient::append` flattens it into an alternating key/value
/// sequence in insertion order (§4.1).
pub type JobPayload = IndexMap<String, String>;

/// Opaque, monotonically ordered identifier the store assigns on append.
///
/// `(stream, MessageId)` uniquely identifies an appended item; the payload is
/// immutable once appended (§3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub String);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Extract the ordering key from a payload, if present and non-empty.
pub(crate) fn ordering_key_of(payload: &JobPayload) -> Option<&str> {
    payload.get(ORDERING_KEY_FIELD).map(String::as_str).filter(|k| !k.is_empty())
}
