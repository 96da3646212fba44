//! Pub/sub demo for the client-embedded broker.
//!
//! # Purpose
//! Demonstrates the end-to-end flow (subscribe, write, read, blocking read
//! with cancellation) with two independent client sessions meeting in a
//! shared storage engine.
//!
//! # Notes
//! This is a developer-facing demo; it favors clarity over performance. It
//! runs against the in-memory engine, so both sessions live in one process.
use anyhow::{Context, Result};
use sluice_client::{ChannelId, Client, ClientConfig, SubscribePolicy};
use sluice_store::StorageEngine;
use sluice_store::memory::MemoryEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

async fn run_demo() -> Result<()> {
    println!("== Sluice Pub/Sub Demo ==");
    println!("Goal: two clients, no broker server, all state in the shared store.");

    println!("Step 1/5: opening two sessions against one storage engine.");
    let engine: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
    let alice = Client::connect(Arc::clone(&engine), ClientConfig::default()).await?;
    let bob = Client::connect(Arc::clone(&engine), ClientConfig::default()).await?;
    println!("  alice = {}", alice.client_id());
    println!("  bob   = {}", bob.client_id());

    let updates = ChannelId::new("updates").context("channel id")?;

    println!("Step 2/5: both clients subscribe to {updates:?}.");
    alice
        .subscribe(std::slice::from_ref(&updates), SubscribePolicy::Earliest)
        .await?;
    bob.subscribe(std::slice::from_ref(&updates), SubscribePolicy::Earliest)
        .await?;

    println!("Step 3/5: bob writes two messages.");
    let ids = bob
        .write(&updates, vec!["hello".into(), "world".into()])
        .await?;
    println!("  assigned ids: {ids:?}");

    println!("Step 4/5: alice reads them back.");
    let batch = alice.read(Some(Duration::from_secs(1))).await?;
    for (channel, messages) in &batch {
        for message in messages {
            println!(
                "  [{channel}] id={} src={} data={:?}",
                message.id, message.src, message.data
            );
        }
    }

    println!("Step 5/5: a blocking read, woken by a concurrent write.");
    let cancel = CancellationToken::new();
    let reader = tokio::spawn(async move {
        let outcome = alice.read_with_cancel(None, &cancel).await;
        (alice, outcome)
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    bob.write(&updates, vec!["late-breaking".into()]).await?;
    let (_, outcome) = reader.await.context("reader task")?;
    println!("  blocking read finished: {:?}", outcome?);

    println!("Done.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    run_demo().await
}
