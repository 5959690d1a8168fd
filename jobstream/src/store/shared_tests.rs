// SPDX-License-Identifier: MIT

use std::sync::Arc;

use super::SharedStore;
use crate::backend::{StartAt, StoreBackend};
use crate::message::JobPayload;
use crate::store::fake::FakeStoreClient;

fn fake_store() -> Arc<SharedStore> {
    Arc::new(SharedStore::from_client(Arc::new(FakeStoreClient::new())))
}

#[tokio::test]
async fn client_before_connect_is_not_connected() -> anyhow::Result<()> {
    let store = SharedStore::new();
    match store.client().await {
        Err(crate::error::StoreClientError::NotConnected) => Ok(()),
        Err(other) => anyhow::bail!("expected NotConnected, got {other}"),
        Ok(_) => anyhow::bail!("expected no client before connect()"),
    }
}

#[tokio::test]
async fn ops_before_connect_fail_without_touching_a_missing_client() -> anyhow::Result<()> {
    let store = SharedStore::new();
    let payload = JobPayload::new();
    match store.append("orders", &payload).await {
        Err(crate::error::StoreClientError::NotConnected) => Ok(()),
        Err(other) => anyhow::bail!("expected NotConnected, got {other}"),
        Ok(_) => anyhow::bail!("append before connect() must fail"),
    }
}

#[tokio::test]
async fn append_and_read_round_trip_through_injected_backend() -> anyhow::Result<()> {
    let store = fake_store();
    store.client().await?.connect().await?;

    let mut payload = JobPayload::new();
    payload.insert("kind".into(), "welcome-email".into());
    store.append("orders", &payload).await?;

    store.create_group("orders", "group:orders", StartAt::Tail).await?;
    // create_group anchors the cursor at the tail *after* the append above,
    // so nothing should be delivered to a freshly created group.
    let batch = store.read_group("orders", "group:orders", "c1", 10, 10).await?;
    assert!(batch.is_empty());
    Ok(())
}

#[tokio::test]
async fn disconnect_clears_cached_config_and_client() -> anyhow::Result<()> {
    let store = fake_store();
    store.client().await?.connect().await?;
    store.disconnect().await;

    match store.client().await {
        Err(crate::error::StoreClientError::NotConnected) => Ok(()),
        Err(other) => anyhow::bail!("expected NotConnected after disconnect, got {other}"),
        Ok(_) => anyhow::bail!("client() must forget the store after disconnect()"),
    }
}
