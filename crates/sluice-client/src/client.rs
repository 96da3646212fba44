//! The client-facing broker session.
//!
//! # Purpose
//! There is no broker server: every client embeds the full broker logic and
//! coordinates with its peers purely through the shared storage engine. This
//! module composes the sequence allocator, channel lock, message log, and
//! subscription registry into the subscribe / unsubscribe / write / read
//! surface.
//!
//! # Design notes
//! Writes serialize per channel through the leased lock; reads are pure and
//! never lock. A client holds at most one channel lock at a time, taking
//! channels one by one, so cross-channel lock ordering never comes up.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use sluice_common::SubscribePolicy;
use sluice_common::ids::{ChannelId, ClientId};
use sluice_store::StorageEngine;
use sluice_wire::MessageRecord;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::lock::ChannelLock;
use crate::log::MessageLog;
use crate::registry::SubscriptionRegistry;
use crate::sequence::SequenceAllocator;

/// Messages delivered by one read pass, keyed by channel. Channels with no
/// new messages are absent, never present with an empty vec.
pub type ReadBatch = HashMap<ChannelId, Vec<MessageRecord>>;

/// How a cancellable read ended.
#[derive(Debug)]
pub enum ReadOutcome {
    /// The batch that was found (possibly empty, when the timeout elapsed).
    Ready(ReadBatch),
    /// The caller's cancellation token fired first. Not an error; cursors
    /// reflect whatever was delivered before the cancellation was observed.
    Cancelled,
}

/// A broker session bound to one client identity.
///
/// Cheap to share behind an `Arc`; all mutable state lives in the storage
/// engine, so writes and reads on different channels proceed independently.
pub struct Client {
    id: ClientId,
    config: ClientConfig,
    engine: Arc<dyn StorageEngine>,
    sequence: SequenceAllocator,
    lock: ChannelLock,
    log: MessageLog,
    registry: SubscriptionRegistry,
}

impl Client {
    /// Open a session with a random client identity.
    pub async fn connect(engine: Arc<dyn StorageEngine>, config: ClientConfig) -> Result<Self> {
        Self::connect_with_id(engine, config, ClientId::random()).await
    }

    /// Open a session with a stable, caller-chosen identity. Reusing an
    /// identity across restarts resumes its subscriptions and cursors.
    pub async fn connect_with_id(
        engine: Arc<dyn StorageEngine>,
        config: ClientConfig,
        id: ClientId,
    ) -> Result<Self> {
        // Surface an unreachable store at connect time instead of on the
        // first operation.
        engine.ping().await?;
        debug!(client = %id, backend = engine.backend_name(), "broker session opened");
        Ok(Self {
            id,
            config,
            sequence: SequenceAllocator::new(Arc::clone(&engine)),
            lock: ChannelLock::new(Arc::clone(&engine)),
            log: MessageLog::new(Arc::clone(&engine)),
            registry: SubscriptionRegistry::new(Arc::clone(&engine)),
            engine,
        })
    }

    pub fn client_id(&self) -> &ClientId {
        &self.id
    }

    /// Liveness probe against the backing store.
    pub async fn ping(&self) -> Result<()> {
        Ok(self.engine.ping().await?)
    }

    /// Subscribe to each channel, seeding new cursors per `policy`.
    ///
    /// Channels are taken one at a time under their channel lock so the seed
    /// cannot race a concurrent writer's append. Re-subscribing to an
    /// already-subscribed channel leaves its cursor untouched.
    pub async fn subscribe(&self, channels: &[ChannelId], policy: SubscribePolicy) -> Result<()> {
        for channel in channels {
            let token = self
                .lock
                .acquire(channel, self.config.lock_lease, self.config.lock_wait)
                .await?;
            let seeded = self.seed_subscription(channel, policy).await;
            self.release_quietly(token).await;
            seeded?;
        }
        Ok(())
    }

    async fn seed_subscription(&self, channel: &ChannelId, policy: SubscribePolicy) -> Result<()> {
        if self.registry.cursor_of(&self.id, channel).await?.is_some() {
            debug!(client = %self.id, %channel, "already subscribed, cursor kept");
            return Ok(());
        }
        let head = self.log.head(channel).await?;
        let cursor = match policy {
            SubscribePolicy::Earliest => 0,
            SubscribePolicy::Current => head,
            // The most recent message (if any) stays eligible for delivery.
            SubscribePolicy::Latest => head.saturating_sub(1),
        };
        self.registry.seed(&self.id, channel, cursor).await
    }

    /// Unsubscribe from each channel. Unknown channels are a no-op.
    pub async fn unsubscribe(&self, channels: &[ChannelId]) -> Result<()> {
        for channel in channels {
            self.registry.remove(&self.id, channel).await?;
        }
        Ok(())
    }

    /// The channels this session is currently subscribed to, queried live.
    pub async fn subscriptions(&self) -> Result<Vec<ChannelId>> {
        Ok(self
            .registry
            .channels_of(&self.id)
            .await?
            .into_iter()
            .map(|(channel, _)| channel)
            .collect())
    }

    /// Append `payloads` to `channel` in input order, returning the assigned
    /// ids in the same order.
    ///
    /// Requires an active subscription. Writes are per-message atomic, not
    /// batch-atomic: on a mid-batch failure the already-appended messages
    /// stay durable and visible, and the error is
    /// [`Error::PartialWrite`] carrying their ids.
    pub async fn write(&self, channel: &ChannelId, payloads: Vec<String>) -> Result<Vec<u64>> {
        if self.registry.cursor_of(&self.id, channel).await?.is_none() {
            return Err(Error::NotSubscribed(channel.clone()));
        }
        if payloads.is_empty() {
            return Ok(Vec::new());
        }
        let attempted = payloads.len();
        let token = self
            .lock
            .acquire(channel, self.config.lock_lease, self.config.lock_wait)
            .await?;
        let (written, failure) = self.append_batch(channel, payloads).await;
        // The lock is released whether or not every append succeeded.
        self.release_quietly(token).await;
        match failure {
            None => Ok(written),
            Some(source) if written.is_empty() => Err(source),
            Some(source) => Err(Error::PartialWrite {
                channel: channel.clone(),
                written,
                attempted,
                source: Box::new(source),
            }),
        }
    }

    /// Allocate, stamp, and append each payload. Must be called with the
    /// channel lock held.
    async fn append_batch(
        &self,
        channel: &ChannelId,
        payloads: Vec<String>,
    ) -> (Vec<u64>, Option<Error>) {
        let mut written = Vec::with_capacity(payloads.len());
        for data in payloads {
            let id = match self.sequence.next(channel).await {
                Ok(id) => id,
                Err(err) => return (written, Some(err)),
            };
            let record = MessageRecord::new(id, now_ms(), self.id.clone(), data);
            if let Err(err) = self.log.append(channel, &record).await {
                return (written, Some(err));
            }
            written.push(id);
        }
        (written, None)
    }

    /// Read new messages from every subscribed channel and advance cursors.
    ///
    /// `timeout` semantics: `None` blocks until at least one channel has new
    /// data; `Some(t)` polls until data arrives or `t` elapses, then returns
    /// whatever was found (possibly an empty batch). The wait is a
    /// cooperative backoff poll, never a busy spin, and the read path takes
    /// no locks.
    pub async fn read(&self, timeout: Option<Duration>) -> Result<ReadBatch> {
        let never = CancellationToken::new();
        match self.read_with_cancel(timeout, &never).await? {
            ReadOutcome::Ready(batch) => Ok(batch),
            // `never` is private to this call and nothing cancels it.
            ReadOutcome::Cancelled => Ok(ReadBatch::new()),
        }
    }

    /// [`read`](Self::read) with caller-driven cancellation, for sessions
    /// that need to tear down a blocking read on disconnect.
    pub async fn read_with_cancel(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut pause = self.config.poll_interval;
        loop {
            if cancel.is_cancelled() {
                return Ok(ReadOutcome::Cancelled);
            }
            let batch = self.poll_channels().await?;
            if !batch.is_empty() {
                return Ok(ReadOutcome::Ready(batch));
            }
            let now = Instant::now();
            if let Some(deadline) = deadline
                && now >= deadline
            {
                return Ok(ReadOutcome::Ready(batch));
            }
            let mut sleep_for = pause;
            if let Some(deadline) = deadline {
                sleep_for = sleep_for.min(deadline - now);
            }
            tokio::select! {
                _ = cancel.cancelled() => return Ok(ReadOutcome::Cancelled),
                _ = tokio::time::sleep(sleep_for) => {}
            }
            pause = (pause * 2).min(self.config.poll_interval_max);
        }
    }

    /// One poll pass over all subscribed channels.
    ///
    /// Fetches every channel before advancing any cursor: a cursor move is a
    /// delivery commitment, so a storage failure partway through must never
    /// leave a cursor past messages the caller did not receive. A failed
    /// fetch aborts the pass with nothing advanced; a failed advance returns
    /// the channels already committed (the failing channel keeps its old
    /// cursor and redelivers on the next pass).
    async fn poll_channels(&self) -> Result<ReadBatch> {
        let mut pending = Vec::new();
        for (channel, cursor) in self.registry.channels_of(&self.id).await? {
            let messages = self
                .log
                .range_after(&channel, cursor, self.config.message_limit)
                .await?;
            if !messages.is_empty() {
                pending.push((channel, messages));
            }
        }
        let mut batch = ReadBatch::new();
        for (channel, messages) in pending {
            let Some(last) = messages.last() else {
                continue;
            };
            if let Err(err) = self.registry.advance(&self.id, &channel, last.id).await {
                if batch.is_empty() {
                    return Err(err);
                }
                warn!(%channel, error = %err, "cursor advance failed mid-pass; channel deferred");
                return Ok(batch);
            }
            batch.insert(channel, messages);
        }
        Ok(batch)
    }

    async fn release_quietly(&self, token: crate::lock::LockToken) {
        // A failed release only delays other writers until the lease TTL;
        // it must not mask the outcome of the operation itself.
        if let Err(err) = self.lock.release(token).await {
            warn!(error = %err, "channel lock release failed; lease will expire");
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
