// Append-only ordered message log, one ordered set per channel.
use std::sync::Arc;

use sluice_common::ids::ChannelId;
use sluice_store::StorageEngine;
use sluice_wire::MessageRecord;
use tracing::warn;

use crate::error::{Error, Result};
use crate::keys;

/// Append-only store of messages keyed by sequence id.
///
/// The log itself enforces nothing about id assignment; uniqueness comes from
/// the allocator/lock pair. What it does enforce is that an id collision is
/// surfaced as [`Error::DuplicateSequenceId`] instead of silently overwriting
/// an existing message.
pub struct MessageLog {
    engine: Arc<dyn StorageEngine>,
}

impl MessageLog {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self { engine }
    }

    /// Insert a record keyed by its id.
    ///
    /// Must only be called for an id not already present; a collision means a
    /// writer bypassed the channel lock or the allocator desynchronized from
    /// the log, and is not retryable.
    pub async fn append(&self, channel: &ChannelId, record: &MessageRecord) -> Result<()> {
        let encoded = record.encode()?;
        let inserted = self
            .engine
            .ordered_insert_new(&keys::log(channel), &encoded, record.id)
            .await?;
        if !inserted {
            warn!(%channel, id = record.id, "sequence id collision in message log");
            return Err(Error::DuplicateSequenceId {
                channel: channel.clone(),
                id: record.id,
            });
        }
        Ok(())
    }

    /// Messages with `id > after`, ascending, at most `limit` entries.
    ///
    /// An empty channel (or nothing past `after`) is an empty vec, not an
    /// error. Restartable: pass the last id received as the next `after`.
    pub async fn range_after(
        &self,
        channel: &ChannelId,
        after: u64,
        limit: usize,
    ) -> Result<Vec<MessageRecord>> {
        let entries = self
            .engine
            .ordered_range_after(&keys::log(channel), after, limit)
            .await?;
        entries
            .iter()
            .map(|entry| MessageRecord::decode(&entry.member).map_err(Error::from))
            .collect()
    }

    /// Highest id currently appended, 0 for an empty channel. Used to seed
    /// subscription cursors.
    pub async fn head(&self, channel: &ChannelId) -> Result<u64> {
        let last = self.engine.ordered_last(&keys::log(channel)).await?;
        Ok(last.map(|entry| entry.score).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_common::ids::ClientId;
    use sluice_store::memory::MemoryEngine;

    fn record(id: u64, data: &str) -> MessageRecord {
        MessageRecord::new(id, 1_000 + id as i64, ClientId::new("writer").expect("id"), data)
    }

    #[tokio::test]
    async fn append_then_range_reads_back_in_order() {
        let log = MessageLog::new(Arc::new(MemoryEngine::new()));
        let channel = ChannelId::new("c1").expect("id");
        for id in 1..=3 {
            log.append(&channel, &record(id, "m")).await.expect("append");
        }
        let messages = log.range_after(&channel, 0, 10).await.expect("range");
        assert_eq!(messages.iter().map(|m| m.id).collect::<Vec<_>>(), [1, 2, 3]);
        let tail = log.range_after(&channel, 2, 10).await.expect("range");
        assert_eq!(tail.iter().map(|m| m.id).collect::<Vec<_>>(), [3]);
    }

    #[tokio::test]
    async fn range_respects_the_limit_and_restarts() {
        let log = MessageLog::new(Arc::new(MemoryEngine::new()));
        let channel = ChannelId::new("c1").expect("id");
        for id in 1..=5 {
            log.append(&channel, &record(id, "m")).await.expect("append");
        }
        let first = log.range_after(&channel, 0, 2).await.expect("range");
        assert_eq!(first.iter().map(|m| m.id).collect::<Vec<_>>(), [1, 2]);
        let second = log
            .range_after(&channel, first.last().expect("non-empty").id, 2)
            .await
            .expect("range");
        assert_eq!(second.iter().map(|m| m.id).collect::<Vec<_>>(), [3, 4]);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected_and_log_unchanged() {
        let log = MessageLog::new(Arc::new(MemoryEngine::new()));
        let channel = ChannelId::new("c1").expect("id");
        log.append(&channel, &record(1, "original"))
            .await
            .expect("append");
        let err = log
            .append(&channel, &record(1, "imposter"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, Error::DuplicateSequenceId { id: 1, .. }));
        let messages = log.range_after(&channel, 0, 10).await.expect("range");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data, "original");
    }

    #[tokio::test]
    async fn empty_channel_reads_empty_and_head_is_zero() {
        let log = MessageLog::new(Arc::new(MemoryEngine::new()));
        let channel = ChannelId::new("empty").expect("id");
        assert!(log.range_after(&channel, 0, 10).await.expect("range").is_empty());
        assert_eq!(log.head(&channel).await.expect("head"), 0);
    }
}
