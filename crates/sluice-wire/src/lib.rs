// Wire representation for messages stored in, and read back from, the log.
use serde::{Deserialize, Serialize};
use sluice_common::ids::ClientId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to serialize message record")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to deserialize message record")]
    Deserialize(#[source] serde_json::Error),
}

/// A single message as it lives in a channel's ordered log.
///
/// The record is self-describing JSON so any process (or a human poking at the
/// backing store) can decode entries without out-of-band schema knowledge.
///
/// ```
/// use sluice_common::ids::ClientId;
/// use sluice_wire::MessageRecord;
///
/// let src = ClientId::new("writer-1").expect("id");
/// let record = MessageRecord::new(1, 1_700_000_000_000, src, "hello");
/// let encoded = record.encode().expect("encode");
/// let decoded = MessageRecord::decode(&encoded).expect("decode");
/// assert_eq!(decoded, record);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Sequence id, unique and strictly increasing within the channel.
    pub id: u64,
    /// Write timestamp in milliseconds since the Unix epoch.
    pub ts: i64,
    /// Identity of the writing client.
    pub src: ClientId,
    /// Caller-supplied payload.
    pub data: String,
}

impl MessageRecord {
    pub fn new(id: u64, ts: i64, src: ClientId, data: impl Into<String>) -> Self {
        Self {
            id,
            ts,
            src,
            data: data.into(),
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::Serialize)
    }

    pub fn decode(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(Error::Deserialize)
    }
}
