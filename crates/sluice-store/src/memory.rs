//! In-memory implementation of the storage engine.
//!
//! # Purpose
//! Implements [`StorageEngine`] entirely in process memory using maps guarded
//! by `tokio::sync::RwLock`. It exists for:
//! - unit and integration tests (no external dependencies)
//! - local development and demos
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: every trait call takes the relevant lock
//!   for its full duration, so each call is atomic as the trait requires.
//! - Multiple clients in one process sharing an `Arc<MemoryEngine>` observe
//!   the same state, which is what the tests rely on.
//!
//! # Leases
//! Leases are lazily expired on access rather than swept by a background task:
//! an expired entry is simply overwritten by the next acquirer. Fencing
//! numbers make stale releases no-ops.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::trace;

use crate::{LeaseToken, ScoredMember, StorageEngine, StoreError, StoreResult};

// How often a blocked acquirer re-checks a held lease.
const ACQUIRE_POLL: Duration = Duration::from_millis(5);

#[derive(Debug)]
struct Lease {
    fencing: u64,
    expires_at: Instant,
}

/// In-memory storage engine for tests, demos, and single-process use.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    counters: RwLock<HashMap<String, u64>>,
    // Ordered sets are plain member -> score maps; range queries sort on
    // read. Scan cost is fine at test/dev scale.
    sets: RwLock<HashMap<String, HashMap<String, u64>>>,
    leases: Mutex<HashMap<String, Lease>>,
    next_fencing: AtomicU64,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sorted_entries(&self, set: &str) -> Vec<ScoredMember> {
        let sets = self.sets.read().await;
        let Some(members) = sets.get(set) else {
            return Vec::new();
        };
        let mut entries: Vec<ScoredMember> = members
            .iter()
            .map(|(member, score)| ScoredMember::new(member.clone(), *score))
            .collect();
        entries.sort_by(|a, b| (a.score, &a.member).cmp(&(b.score, &b.member)));
        entries
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn incr(&self, key: &str) -> StoreResult<u64> {
        let mut counters = self.counters.write().await;
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn ordered_insert(&self, set: &str, member: &str, score: u64) -> StoreResult<()> {
        let mut sets = self.sets.write().await;
        sets.entry(set.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn ordered_insert_new(&self, set: &str, member: &str, score: u64) -> StoreResult<bool> {
        let mut sets = self.sets.write().await;
        let members = sets.entry(set.to_string()).or_default();
        if members.values().any(|existing| *existing == score) {
            return Ok(false);
        }
        members.insert(member.to_string(), score);
        Ok(true)
    }

    async fn ordered_remove(&self, set: &str, member: &str) -> StoreResult<()> {
        let mut sets = self.sets.write().await;
        if let Some(members) = sets.get_mut(set) {
            members.remove(member);
            if members.is_empty() {
                sets.remove(set);
            }
        }
        Ok(())
    }

    async fn ordered_range_after(
        &self,
        set: &str,
        after: u64,
        limit: usize,
    ) -> StoreResult<Vec<ScoredMember>> {
        let mut entries = self.sorted_entries(set).await;
        entries.retain(|entry| entry.score > after);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn ordered_entries(&self, set: &str) -> StoreResult<Vec<ScoredMember>> {
        Ok(self.sorted_entries(set).await)
    }

    async fn ordered_last(&self, set: &str) -> StoreResult<Option<ScoredMember>> {
        Ok(self.sorted_entries(set).await.pop())
    }

    async fn acquire_lease(
        &self,
        key: &str,
        ttl: Duration,
        wait_timeout: Duration,
    ) -> StoreResult<LeaseToken> {
        let deadline = Instant::now() + wait_timeout;
        loop {
            {
                let mut leases = self.leases.lock().await;
                let now = Instant::now();
                let free = match leases.get(key) {
                    // Lazy expiry: a stale entry is as good as a free slot.
                    Some(lease) => lease.expires_at <= now,
                    None => true,
                };
                if free {
                    let fencing = self.next_fencing.fetch_add(1, Ordering::Relaxed) + 1;
                    leases.insert(
                        key.to_string(),
                        Lease {
                            fencing,
                            expires_at: now + ttl,
                        },
                    );
                    trace!(key, fencing, "lease acquired");
                    return Ok(LeaseToken {
                        key: key.to_string(),
                        fencing,
                    });
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(StoreError::LeaseTimeout(key.to_string()));
            }
            tokio::time::sleep(ACQUIRE_POLL.min(deadline - now)).await;
        }
    }

    async fn release_lease(&self, token: LeaseToken) -> StoreResult<()> {
        let mut leases = self.leases.lock().await;
        let held_by_token = leases
            .get(&token.key)
            .is_some_and(|lease| lease.fencing == token.fencing);
        if held_by_token {
            leases.remove(&token.key);
            trace!(key = %token.key, fencing = token.fencing, "lease released");
        }
        // Anything else means the lease expired or was re-granted; releasing
        // a stale token is defined as a no-op.
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
