// Per-(client, channel) cursor state and the client -> channels reverse index.
use std::sync::Arc;

use sluice_common::ids::{ChannelId, ClientId};
use sluice_store::{StorageEngine, StoreError};
use tracing::debug;

use crate::error::{Error, Result};
use crate::keys;

/// Subscription and cursor bookkeeping.
///
/// Every cursor lives in two ordered sets: the channel's subscriber set
/// (client -> cursor) and the client's reverse index (channel -> cursor).
/// The reverse index is what lets a read enumerate its channels without the
/// caller repeating the list; the subscriber set gives writers and tooling
/// the per-channel view. Cursors are private to one client, so the registry
/// needs no locking of its own.
pub struct SubscriptionRegistry {
    engine: Arc<dyn StorageEngine>,
}

impl SubscriptionRegistry {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self { engine }
    }

    /// Create the cursor pair for a brand-new subscription.
    ///
    /// Callers check [`cursor_of`](Self::cursor_of) first (under the channel
    /// lock) so an existing cursor is never reseeded.
    pub async fn seed(&self, client: &ClientId, channel: &ChannelId, cursor: u64) -> Result<()> {
        self.engine
            .ordered_insert(&keys::cursors(channel), client.as_str(), cursor)
            .await?;
        self.engine
            .ordered_insert(&keys::subscriptions(client), channel.as_str(), cursor)
            .await?;
        debug!(%client, %channel, cursor, "subscription created");
        Ok(())
    }

    /// Drop both cursor entries. A channel the client never subscribed to is
    /// a no-op, not an error.
    pub async fn remove(&self, client: &ClientId, channel: &ChannelId) -> Result<()> {
        self.engine
            .ordered_remove(&keys::cursors(channel), client.as_str())
            .await?;
        self.engine
            .ordered_remove(&keys::subscriptions(client), channel.as_str())
            .await?;
        debug!(%client, %channel, "subscription removed");
        Ok(())
    }

    /// The channels this client is subscribed to, with their cursors.
    ///
    /// Always queried live from the store; the client holds no cached
    /// subscription state.
    pub async fn channels_of(&self, client: &ClientId) -> Result<Vec<(ChannelId, u64)>> {
        let entries = self
            .engine
            .ordered_entries(&keys::subscriptions(client))
            .await?;
        entries
            .into_iter()
            .map(|entry| {
                let channel = ChannelId::new(entry.member.as_str()).map_err(|_| {
                    Error::Storage(StoreError::Unexpected(anyhow::anyhow!(
                        "malformed channel id in subscription index: {:?}",
                        entry.member
                    )))
                })?;
                Ok((channel, entry.score))
            })
            .collect()
    }

    /// Last message id delivered to `client` on `channel`, or `None` when not
    /// subscribed.
    pub async fn cursor_of(&self, client: &ClientId, channel: &ChannelId) -> Result<Option<u64>> {
        let entries = self
            .engine
            .ordered_entries(&keys::subscriptions(client))
            .await?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.member == channel.as_str())
            .map(|entry| entry.score))
    }

    /// Move the cursor forward to `new_cursor`.
    ///
    /// Cursors are monotone: a `new_cursor` at or below the current one is
    /// clamped to a no-op rather than rejected, since the read path is the
    /// only caller and can only have observed ids past the cursor. Returns
    /// the effective cursor.
    pub async fn advance(
        &self,
        client: &ClientId,
        channel: &ChannelId,
        new_cursor: u64,
    ) -> Result<u64> {
        let current = self
            .cursor_of(client, channel)
            .await?
            .ok_or_else(|| Error::NotSubscribed(channel.clone()))?;
        if new_cursor <= current {
            return Ok(current);
        }
        self.engine
            .ordered_insert(&keys::cursors(channel), client.as_str(), new_cursor)
            .await?;
        self.engine
            .ordered_insert(&keys::subscriptions(client), channel.as_str(), new_cursor)
            .await?;
        Ok(new_cursor)
    }
}
