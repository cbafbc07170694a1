//! Per-address coordination of remote chunk deliveries.

use shoal_api::{Chunk, FetchParty};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Instant;
use tokio::sync::watch;

/// Maintains the state of one outstanding remote request.
///
/// A fetcher fans a single delivery out to every party waiting on the same
/// address: the chunk slot is written exactly once, then the delivered flag
/// flips, in that order, so a woken waiter always observes the chunk. It is
/// possible for the same chunk to arrive more than once, through syncing
/// and through a retrieve request at the same time; later deliveries are
/// no-ops.
#[derive(Debug)]
pub struct Fetcher {
    chunk: OnceLock<Chunk>,
    delivered: watch::Sender<bool>,
    created_at: Instant,
    created_by: FetchParty,
    requested_by_syncer: AtomicBool,
}

impl Fetcher {
    /// Create a fetcher on behalf of `created_by`.
    pub fn new(created_by: FetchParty) -> Self {
        let (delivered, _) = watch::channel(false);
        Self {
            chunk: OnceLock::new(),
            delivered,
            created_at: Instant::now(),
            created_by,
            requested_by_syncer: false.into(),
        }
    }

    /// Publish a delivered chunk and wake all waiters. Safe against
    /// concurrent double delivery; only the first call takes effect.
    pub fn safe_close(&self, chunk: Chunk) {
        if self.chunk.set(chunk).is_ok() {
            let _ = self.delivered.send(true);
        }
    }

    /// Wait for the delivery and return the chunk. Resolves immediately if
    /// the chunk already arrived.
    pub async fn delivered(&self) -> Chunk {
        let mut delivered = self.delivered.subscribe();
        delivered
            .wait_for(|delivered| *delivered)
            .await
            .expect("sender held by the fetcher itself");
        self.chunk
            .get()
            .cloned()
            .expect("chunk slot written before the delivered flag")
    }

    /// Which party installed this fetcher.
    pub fn created_by(&self) -> FetchParty {
        self.created_by
    }

    /// When this fetcher was installed; measures delivery latency.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub(crate) fn requested_by_syncer(&self) -> bool {
        self.requested_by_syncer.load(Ordering::Relaxed)
    }

    pub(crate) fn set_requested_by_syncer(&self) {
        self.requested_by_syncer.store(true, Ordering::Relaxed);
    }
}
