// Shared identifiers and small vocabulary types used across the sluice crates.
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid id: {0:?}")]
    InvalidId(String),
}

pub mod ids {
    // Strongly typed ids so channel and client names cannot be mixed up at
    // compile time. Unlike numeric ids these are opaque, caller-chosen strings.
    use super::{Error, Result};
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::str::FromStr;

    macro_rules! id_type {
        ($name:ident) => {
            #[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(String);

            impl $name {
                // Wrap a caller-chosen name, rejecting ids that cannot be
                // embedded in storage keys.
                pub fn new(input: impl Into<String>) -> Result<Self> {
                    let input = input.into();
                    if input.is_empty() || input.chars().any(char::is_whitespace) {
                        return Err(Error::InvalidId(input));
                    }
                    Ok(Self(input))
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl FromStr for $name {
                type Err = Error;

                fn from_str(input: &str) -> Result<Self> {
                    Self::new(input)
                }
            }
        };
    }

    id_type!(ChannelId);
    id_type!(ClientId);

    impl ClientId {
        // Random identity for clients that do not care about a stable name.
        pub fn random() -> Self {
            Self(uuid::Uuid::new_v4().simple().to_string())
        }
    }
}

/// How a brand-new subscription seeds its cursor.
///
/// Re-subscribing to an already-subscribed channel never reseeds; the policy
/// only applies the first time a (client, channel) pair is created.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribePolicy {
    /// Replay the full retained log, starting from the first message.
    Earliest,
    /// Only messages appended after the subscription was created.
    Current,
    /// The single most recent message (if any) plus everything after it.
    Latest,
}
