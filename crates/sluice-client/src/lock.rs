// Leased per-channel mutual exclusion for writers.
use std::sync::Arc;
use std::time::Duration;

use sluice_common::ids::ChannelId;
use sluice_store::{LeaseToken, StorageEngine, StoreError};
use tracing::debug;

use crate::error::{Error, Result};
use crate::keys;

/// Proof that the holder owns a channel's write lock.
#[derive(Debug)]
pub struct LockToken {
    channel: ChannelId,
    lease: LeaseToken,
}

impl LockToken {
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }
}

/// TTL-bounded exclusive lock scoped to one channel.
///
/// The lease makes the allocate-then-append write sequence appear atomic to
/// concurrent writers, and the TTL guarantees a crashed holder never blocks
/// the channel forever. A client holds at most one lock at a time (writes
/// and subscribes take channels one by one), so lock-ordering deadlocks
/// cannot arise.
pub struct ChannelLock {
    engine: Arc<dyn StorageEngine>,
}

impl ChannelLock {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self { engine }
    }

    /// Wait up to `wait_timeout` for the channel's lease.
    ///
    /// Fails with [`Error::LockTimeout`], a transient condition the caller may
    /// retry with backoff.
    pub async fn acquire(
        &self,
        channel: &ChannelId,
        lease: Duration,
        wait_timeout: Duration,
    ) -> Result<LockToken> {
        match self
            .engine
            .acquire_lease(&keys::lock(channel), lease, wait_timeout)
            .await
        {
            Ok(lease) => {
                debug!(%channel, "channel lock acquired");
                Ok(LockToken {
                    channel: channel.clone(),
                    lease,
                })
            }
            Err(StoreError::LeaseTimeout(_)) => Err(Error::LockTimeout(channel.clone())),
            Err(other) => Err(other.into()),
        }
    }

    /// Release a held lock. Idempotent: the engine treats expired or
    /// re-granted tokens as a no-op.
    pub async fn release(&self, token: LockToken) -> Result<()> {
        debug!(channel = %token.channel, "channel lock released");
        self.engine.release_lease(token.lease).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_store::memory::MemoryEngine;

    #[tokio::test]
    async fn contended_acquire_times_out_with_lock_timeout() {
        let engine = Arc::new(MemoryEngine::new());
        let lock = ChannelLock::new(engine);
        let channel = ChannelId::new("c1").expect("id");
        let held = lock
            .acquire(&channel, Duration::from_secs(5), Duration::from_millis(50))
            .await
            .expect("acquire");
        let err = lock
            .acquire(&channel, Duration::from_secs(5), Duration::from_millis(30))
            .await
            .expect_err("contended");
        assert!(matches!(err, Error::LockTimeout(c) if c == channel));
        lock.release(held).await.expect("release");
    }

    #[tokio::test]
    async fn locks_on_different_channels_are_independent() {
        let engine = Arc::new(MemoryEngine::new());
        let lock = ChannelLock::new(engine);
        let c1 = ChannelId::new("c1").expect("id");
        let c2 = ChannelId::new("c2").expect("id");
        let t1 = lock
            .acquire(&c1, Duration::from_secs(5), Duration::from_millis(50))
            .await
            .expect("acquire c1");
        let t2 = lock
            .acquire(&c2, Duration::from_secs(5), Duration::from_millis(50))
            .await
            .expect("acquire c2");
        lock.release(t1).await.expect("release");
        lock.release(t2).await.expect("release");
    }

    #[tokio::test]
    async fn expired_lock_is_reacquirable() {
        let engine = Arc::new(MemoryEngine::new());
        let lock = ChannelLock::new(engine);
        let channel = ChannelId::new("c1").expect("id");
        // Holder "crashes": short lease, never released.
        let _abandoned = lock
            .acquire(&channel, Duration::from_millis(20), Duration::from_millis(50))
            .await
            .expect("acquire");
        let token = lock
            .acquire(&channel, Duration::from_secs(5), Duration::from_millis(200))
            .await
            .expect("reacquire after expiry");
        lock.release(token).await.expect("release");
    }
}
