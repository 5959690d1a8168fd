// SPDX-License-Identifier: MIT

//! Reference application shell (spec §4.5): wires configuration, builds one
//! `SharedStore`, registers a couple of example `Consumer`s, publishes a
//! few demo jobs, and tears everything down on SIGINT/SIGTERM.
//!
//! Not part of `jobstream`'s public contract — this binary exists so the
//! wiring described in §4.5 has somewhere concrete to live.

use std::sync::Arc;

use clap::Parser;
use jobstream::{Config, Consumer, ConsumerOptions, JobPayload, Publisher, PublishOptions, SharedStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "worker-shell", version, about = "Reference jobstream application shell.")]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// JSON object to publish as an extra demo payload, e.g. '{"kind":"ping"}'.
    #[arg(long)]
    extra_payload: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(cli.config.log_level.clone()))
        .init();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = Arc::new(SharedStore::new());
    store.connect(cli.config.store_config()).await?;
    info!(host = %cli.config.store_host, port = cli.config.store_port, "connected to backing store");

    let publisher = Publisher::new(Arc::clone(&store));

    // One unordered consumer (plain work queue) and one ordered-by-key
    // consumer, against two different streams, matching §4.5's
    // "registers handlers with Consumer instances per stream".
    let emails = Consumer::new(
        store.client().await?,
        "emails",
        |payload, id, _token: CancellationToken| async move {
            info!(message_id = %id, ?payload, "sending email");
            Ok(())
        },
        ConsumerOptions { concurrency: 4, ..Default::default() },
    )?;

    let account_events = Consumer::new(
        store.client().await?,
        "account-events",
        |payload, id, token: CancellationToken| async move {
            if token.is_cancelled() {
                warn!(message_id = %id, "shutdown requested mid-handler; finishing anyway");
            }
            info!(message_id = %id, ?payload, "applying account event");
            Ok(())
        },
        ConsumerOptions { concurrency: 4, process_ordered_by_key: true, ..Default::default() },
    )?;

    emails.start().await?;
    account_events.start().await?;

    let mut welcome = JobPayload::new();
    welcome.insert("email".into(), "new-user@example.com".into());
    welcome.insert("subject".into(), "welcome".into());
    publisher.publish("emails", &welcome, PublishOptions::default()).await?;

    let mut deposit = JobPayload::new();
    deposit.insert("account".into(), "acct-42".into());
    deposit.insert("amount".into(), "100".into());
    publisher
        .publish("account-events", &deposit, PublishOptions { ordering_key: Some("acct-42".into()) })
        .await?;

    if let Some(raw) = cli.extra_payload.as_deref() {
        let fields: std::collections::HashMap<String, String> = serde_json::from_str(raw)
            .map_err(|e| anyhow::anyhow!("--extra-payload must be a flat JSON object of strings: {e}"))?;
        let payload: JobPayload = fields.into_iter().collect();
        publisher.publish("emails", &payload, PublishOptions::default()).await?;
    }

    wait_for_shutdown_signal().await;

    info!("shutdown signal received; draining consumers");
    emails.stop().await;
    account_events.stop().await;
    store.disconnect().await;
    info!("shutdown complete");
    Ok(())
}

/// First signal triggers graceful shutdown; a second signal forces an
/// immediate exit, mirroring the teacher's two-stage signal handling.
async fn wait_for_shutdown_signal() {
    first_signal().await;
    tokio::spawn(async move {
        first_signal().await;
        warn!("second shutdown signal received; forcing exit");
        std::process::exit(130);
    });
}

#[cfg(unix)]
async fn first_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).ok();
    let mut sigint = signal(SignalKind::interrupt()).ok();
    tokio::select! {
        _ = async { if let Some(s) = sigterm.as_mut() { s.recv().await } else { std::future::pending().await } } => {
            info!("received SIGTERM");
        }
        _ = async { if let Some(s) = sigint.as_mut() { s.recv().await } else { std::future::pending().await } } => {
            info!("received SIGINT");
        }
    }
}

#[cfg(not(unix))]
async fn first_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received ctrl-c");
}
