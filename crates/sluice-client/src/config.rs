// Client-side defaults for locking, polling, and read batch sizing.
use std::time::Duration;

pub(crate) const DEFAULT_MESSAGE_LIMIT: usize = 512;
pub(crate) const DEFAULT_LOCK_LEASE: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(1);
pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);
pub(crate) const DEFAULT_POLL_INTERVAL_MAX: Duration = Duration::from_millis(250);

/// Tuning knobs for a [`Client`](crate::Client).
///
/// Defaults are conservative for local/dev usage; latency-sensitive readers
/// should lower `poll_interval`, contended writers should raise `lock_wait`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum messages fetched per channel in a single read pass.
    pub message_limit: usize,
    /// TTL on the channel write lock. Bounds how long a crashed writer can
    /// block the channel.
    pub lock_lease: Duration,
    /// How long a writer waits for a contended channel lock before failing
    /// with `LockTimeout`.
    pub lock_wait: Duration,
    /// Initial pause between empty read polls.
    pub poll_interval: Duration,
    /// Upper bound the poll pause backs off to while a read stays empty.
    pub poll_interval_max: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            message_limit: DEFAULT_MESSAGE_LIMIT,
            lock_lease: DEFAULT_LOCK_LEASE,
            lock_wait: DEFAULT_LOCK_WAIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_interval_max: DEFAULT_POLL_INTERVAL_MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ClientConfig;

    #[test]
    fn defaults_are_sane() {
        let config = ClientConfig::default();
        assert!(config.message_limit > 0);
        assert!(config.lock_lease > config.lock_wait);
        assert!(config.poll_interval_max >= config.poll_interval);
    }
}
