// Key namespace in the backing store.
//
// Per channel: a sequence counter, a lock key, the ordered message log, and
// an ordered set of subscriber cursors. Per client: the reverse index of
// channel -> cursor. The cursor is bookkept in both places so a reader can
// enumerate its channels without naming them, and a channel can enumerate its
// subscribers.
use sluice_common::ids::{ChannelId, ClientId};

pub(crate) fn sequence(channel: &ChannelId) -> String {
    format!("sluice:seq:{channel}")
}

pub(crate) fn lock(channel: &ChannelId) -> String {
    format!("sluice:lock:{channel}")
}

pub(crate) fn log(channel: &ChannelId) -> String {
    format!("sluice:log:{channel}")
}

pub(crate) fn cursors(channel: &ChannelId) -> String {
    format!("sluice:cursors:{channel}")
}

pub(crate) fn subscriptions(client: &ClientId) -> String {
    format!("sluice:subs:{client}")
}
