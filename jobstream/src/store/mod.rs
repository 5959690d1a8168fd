// SPDX-License-Identifier: MIT

//! The backing-store layer: [`client::RedisStoreClient`] (§4.1) owned by
//! [`shared::SharedStore`] (§4.2).

pub mod client;
pub mod shared;

pub use client::RedisStoreClient;
pub use shared::SharedStore;

#[cfg(test)]
pub(crate) mod fake;
