// Client-embedded message broker over an ordered key-value store.
//
// There is no broker server process: every client runs the full broker logic
// and meets its peers only in the backing store. This crate keeps that safe
// using nothing but the store's atomic counters, ordered sets, and leased
// locks: strictly increasing per-channel sequence ids, multi-step writes that
// look atomic to concurrent writers, and per-consumer cursors that never skip
// or repeat a message.
//
// Crate layout mirrors the data flow:
// - `sequence`: per-channel id allocation (atomic counter)
// - `lock`: leased per-channel writer exclusion with TTL auto-expiry
// - `log`: the append-only ordered message log
// - `registry`: subscription cursors and the client reverse index
// - `client`: the session surface composing them (subscribe / unsubscribe /
//   write / read)
mod client;
mod config;
mod error;
mod keys;
mod lock;
mod log;
mod registry;
mod sequence;

pub use client::{Client, ReadBatch, ReadOutcome};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use lock::{ChannelLock, LockToken};
pub use log::MessageLog;
pub use registry::SubscriptionRegistry;
pub use sequence::SequenceAllocator;

pub use sluice_common::SubscribePolicy;
pub use sluice_common::ids::{ChannelId, ClientId};
pub use sluice_wire::MessageRecord;
