//! Upload-session progress counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// The lifecycle states a chunk moves through during an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagState {
    /// The chunk was written to the local store.
    Stored,
    /// The local store reported the chunk as already present.
    Seen,
    /// The chunk was sent to a peer by the push-sync collaborator.
    Sent,
    /// A storage receipt was received for the chunk.
    Synced,
}

/// Monotonic counters tracking the progress of one upload session.
///
/// Created when the session starts and shared by everything that touches
/// the session's chunks; all updates are atomic increments, so the counters
/// never decrease.
#[derive(Debug, Default)]
pub struct Tag {
    uid: u32,
    total: AtomicU64,
    stored: AtomicU64,
    seen: AtomicU64,
    sent: AtomicU64,
    synced: AtomicU64,
}

impl Tag {
    /// Construct a tag for a new upload session.
    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            ..Default::default()
        }
    }

    /// The session id this tag belongs to.
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Increment the counter for `state` by one.
    pub fn inc(&self, state: TagState) {
        self.counter(state).fetch_add(1, Ordering::Relaxed);
    }

    /// Read the counter for `state`.
    pub fn get(&self, state: TagState) -> u64 {
        self.counter(state).load(Ordering::Relaxed)
    }

    /// Record the expected total number of chunks in the session, once the
    /// producer knows it.
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// The expected total number of chunks, zero until known.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    fn counter(&self, state: TagState) -> &AtomicU64 {
        match state {
            TagState::Stored => &self.stored,
            TagState::Seen => &self.seen,
            TagState::Sent => &self.sent,
            TagState::Synced => &self.synced,
        }
    }
}
