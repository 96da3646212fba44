//! Storage engine interface for the sluice broker.
//!
//! # Purpose
//! Broker logic runs inside every client process; the only shared state lives
//! in an external ordered key-value store reached through the [`StorageEngine`]
//! trait. The trait is deliberately narrow: atomic counters, an ordered
//! associative range structure, and leased locks. Everything the broker
//! guarantees (sequencing, cursor tracking, mutual exclusion) is built from
//! these primitives.
//!
//! # Backends
//! This crate ships [`memory::MemoryEngine`] for tests and local development.
//! Durable backends live behind the same trait and are configured by the
//! embedding application; connection handling and retries belong to them, not
//! to the broker core.
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod memory;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("lease wait timed out for {0}")]
    LeaseTimeout(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// A member of an ordered set together with its ordering score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMember {
    pub member: String,
    pub score: u64,
}

impl ScoredMember {
    pub fn new(member: impl Into<String>, score: u64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}

/// Proof of lease ownership handed out by [`StorageEngine::acquire_lease`].
///
/// The fencing number distinguishes successive holders of the same key, so a
/// stale token (expired and re-granted to someone else) can never release the
/// current holder's lease.
#[derive(Debug)]
pub struct LeaseToken {
    pub key: String,
    pub fencing: u64,
}

/// Narrow interface over an external ordered key-value store.
///
/// Ordered sets hold unique string members sorted by a `u64` score; range
/// queries are ascending by `(score, member)`. All operations are atomic at
/// the granularity of a single call.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Liveness probe against the backing store.
    async fn ping(&self) -> StoreResult<()>;

    /// Atomic increment-and-get. The first call for a key returns 1.
    async fn incr(&self, key: &str) -> StoreResult<u64>;

    /// Insert a member, or update its score when it already exists.
    async fn ordered_insert(&self, set: &str, member: &str, score: u64) -> StoreResult<()>;

    /// Insert a member only if no existing member occupies `score`.
    ///
    /// Returns `false` (without inserting) on a score collision. The message
    /// log uses this to detect sequence-id reuse.
    async fn ordered_insert_new(&self, set: &str, member: &str, score: u64) -> StoreResult<bool>;

    /// Remove a member; absent members are a no-op.
    async fn ordered_remove(&self, set: &str, member: &str) -> StoreResult<()>;

    /// Members with `score > after`, ascending, at most `limit` entries.
    async fn ordered_range_after(
        &self,
        set: &str,
        after: u64,
        limit: usize,
    ) -> StoreResult<Vec<ScoredMember>>;

    /// Every member of the set, ascending.
    async fn ordered_entries(&self, set: &str) -> StoreResult<Vec<ScoredMember>>;

    /// The member with the highest score, if the set is non-empty.
    async fn ordered_last(&self, set: &str) -> StoreResult<Option<ScoredMember>>;

    /// Acquire a TTL-bounded exclusive lease on `key`.
    ///
    /// Blocks cooperatively until the lease is free or `wait_timeout` elapses,
    /// in which case the call fails with [`StoreError::LeaseTimeout`]. A lease
    /// that is never released becomes acquirable again once `ttl` passes.
    async fn acquire_lease(
        &self,
        key: &str,
        ttl: Duration,
        wait_timeout: Duration,
    ) -> StoreResult<LeaseToken>;

    /// Release a held lease. Idempotent: releasing an expired or already
    /// re-granted token is a no-op.
    async fn release_lease(&self, token: LeaseToken) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str;
}
