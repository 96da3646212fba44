use sluice_common::ids::ChannelId;
use sluice_store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything a broker operation can fail with, classified so callers can
/// decide between retrying, resubscribing, and giving up.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Transient: another writer held the channel lock for the whole wait
    /// window. Retry with backoff.
    #[error("timed out waiting for the lock on channel {0}")]
    LockTimeout(ChannelId),

    /// Protocol violation: the allocated sequence id was already present in
    /// the log. Indicates a writer bypassed the lock or allocator and log
    /// have desynchronized. Not retryable.
    #[error("duplicate sequence id {id} on channel {channel}")]
    DuplicateSequenceId { channel: ChannelId, id: u64 },

    /// Caller error: writes require an active subscription to the channel.
    #[error("not subscribed to channel {0}")]
    NotSubscribed(ChannelId),

    /// The backing store cannot be reached. Reconnection is the embedding
    /// application's concern; the broker core never retries.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A batch write failed after some messages were already appended. The
    /// appended messages are durable and visible; `written` carries their ids
    /// so the caller can avoid re-sending them.
    #[error("partial write on channel {channel}: {appended} of {attempted} messages appended", appended = .written.len())]
    PartialWrite {
        channel: ChannelId,
        written: Vec<u64>,
        attempted: usize,
        #[source]
        source: Box<Error>,
    },

    /// A record read back from the log could not be decoded.
    #[error("corrupt message record in the log")]
    Wire(#[from] sluice_wire::Error),

    /// Any other storage-engine failure.
    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(message) => Error::StorageUnavailable(message),
            // LeaseTimeout is mapped to LockTimeout at the lock call site,
            // where the channel id is known; anywhere else it is unexpected.
            other => Error::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_maps_to_storage_unavailable() {
        let err: Error = StoreError::Unavailable("refused".into()).into();
        assert!(matches!(err, Error::StorageUnavailable(m) if m == "refused"));
    }

    #[test]
    fn partial_write_reports_progress() {
        let channel = ChannelId::new("c1").expect("id");
        let err = Error::PartialWrite {
            channel: channel.clone(),
            written: vec![1, 2],
            attempted: 5,
            source: Box::new(Error::StorageUnavailable("gone".into())),
        };
        assert_eq!(
            err.to_string(),
            "partial write on channel c1: 2 of 5 messages appended"
        );
    }
}
