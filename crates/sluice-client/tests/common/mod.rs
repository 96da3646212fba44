#![allow(dead_code)]
// Shared fixtures for the broker integration tests.
use std::sync::Arc;
use std::time::Duration;

use sluice_client::{ChannelId, Client, ClientConfig, ClientId};
use sluice_store::StorageEngine;
use sluice_store::memory::MemoryEngine;

pub fn channel(name: &str) -> ChannelId {
    ChannelId::new(name).expect("channel id")
}

pub fn client_id(name: &str) -> ClientId {
    ClientId::new(name).expect("client id")
}

/// Test-friendly config: short waits so failure cases resolve quickly.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        lock_wait: Duration::from_millis(500),
        poll_interval: Duration::from_millis(5),
        poll_interval_max: Duration::from_millis(20),
        ..ClientConfig::default()
    }
}

pub async fn connect(engine: &Arc<MemoryEngine>, name: &str) -> Client {
    let engine: Arc<dyn StorageEngine> = engine.clone();
    Client::connect_with_id(engine, test_config(), client_id(name))
        .await
        .expect("connect")
}
