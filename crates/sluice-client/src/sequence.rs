// Per-channel sequence id allocation.
use std::sync::Arc;

use sluice_common::ids::ChannelId;
use sluice_store::StorageEngine;

use crate::error::Result;
use crate::keys;

/// Allocates strictly increasing message ids for a channel.
///
/// Backed by the store's atomic counter; the first id on a channel is 1.
/// Callers must hold the channel lock, which is what turns "atomic counter"
/// into "no id is ever issued twice": the counter alone cannot protect the
/// allocate-then-append pair.
pub struct SequenceAllocator {
    engine: Arc<dyn StorageEngine>,
}

impl SequenceAllocator {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self { engine }
    }

    /// Allocate the next id. No local retry; storage failures propagate.
    pub async fn next(&self, channel: &ChannelId) -> Result<u64> {
        Ok(self.engine.incr(&keys::sequence(channel)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_store::memory::MemoryEngine;

    #[tokio::test]
    async fn ids_start_at_one_and_are_per_channel() {
        let engine = Arc::new(MemoryEngine::new());
        let allocator = SequenceAllocator::new(engine);
        let orders = ChannelId::new("orders").expect("id");
        let audit = ChannelId::new("audit").expect("id");
        assert_eq!(allocator.next(&orders).await.expect("next"), 1);
        assert_eq!(allocator.next(&orders).await.expect("next"), 2);
        assert_eq!(allocator.next(&audit).await.expect("next"), 1);
    }
}
