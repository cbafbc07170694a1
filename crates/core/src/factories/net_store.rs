//! The net store: local-first chunk resolution with remote fallback.
//!
//! It consists of multiple parts:
//! - A fetcher table remembering, per address, the coordination record all
//!   waiters on that address share
//! - A single-flight request group so concurrent gets for one missing
//!   address mount one outbound fetch effort
//! - The remote fetch loop rotating through peers supplied by the
//!   [RemoteGet] collaborator
//!
//! ### Get
//!
//! - Read the local store. A hit returns immediately; a miss that is not
//!   `NotFound` is a store fault and terminal.
//! - Join the single-flight group under the address. The leading caller
//!   installs (or joins) the fetcher and runs the remote fetch loop under
//!   the configured global deadline.
//!
//! ### Remote fetch loop
//!
//! - Ask [RemoteGet] for the next eligible peer; `NoSuitablePeer` ends the
//!   effort.
//! - Record the peer in the request's skip set so a retry rotates onward.
//! - Wait for the fetcher's delivery up to the search timeout, then try
//!   the next peer. The per-attempt cleanup handle runs either way.
//!
//! ### Put
//!
//! Deliveries land exclusively through [NetStore::put]: waiters parked on
//! the address are released first, the chunk is written to the local
//! store, then the fetcher entry is dropped.

use lru::LruCache;
use shoal_api::{
    builder::Builder, config::Config, Address, BoxFut, Chunk, ChunkStore,
    DynChunkStore, DynNetStore, DynNetStoreFactory, DynRemoteGet,
    FetchParty, ModeGet, ModePut, NetStoreConfig,
    NetStoreFactory as NetStoreFactoryTrait, PeerId, RemoteGet, Request,
    ShoalError, ShoalResult,
};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod fetcher;
pub use fetcher::Fetcher;

mod request_group;
use request_group::RequestGroup;

/// A delivery slower than this gets logged; it usually means the chunk was
/// found far from the neighbourhood it belongs to.
const SLOW_CHUNK_DELIVERY: Duration = Duration::from_secs(5);

/// The production net store factory provided by shoal.
#[derive(Debug)]
pub struct NetStoreFactory {}

impl NetStoreFactory {
    /// Construct a new NetStoreFactory.
    pub fn create() -> DynNetStoreFactory {
        Arc::new(Self {})
    }
}

impl NetStoreFactoryTrait for NetStoreFactory {
    fn validate_config(&self, config: &Config) -> ShoalResult<()> {
        let config = &config.net_store;
        if config.fetcher_cache_capacity == 0 {
            return Err(ShoalError::other(
                "fetcherCacheCapacity must be non-zero",
            ));
        }
        if config.search_timeout_ms == 0 || config.global_timeout_ms == 0 {
            return Err(ShoalError::other("timeouts must be non-zero"));
        }
        Ok(())
    }

    fn create(
        &self,
        builder: Arc<Builder>,
        chunk_store: DynChunkStore,
        remote_get: DynRemoteGet,
        local_id: PeerId,
    ) -> BoxFut<'static, ShoalResult<DynNetStore>> {
        Box::pin(async move {
            let out: DynNetStore = Arc::new(NetStore::new(
                builder.config.net_store.clone(),
                chunk_store,
                remote_get,
                local_id,
            ));
            Ok(out)
        })
    }
}

struct Inner {
    store: DynChunkStore,
    remote_get: DynRemoteGet,
    local_id: PeerId,
    fetchers: Mutex<LruCache<String, Arc<Fetcher>>>,
    search_timeout: Duration,
}

/// A store resolving chunks locally first and from remote peers on a miss.
pub struct NetStore {
    inner: Arc<Inner>,
    request_group: RequestGroup<Chunk>,
    global_timeout: Duration,
}

impl NetStore {
    /// Create a net store over a local chunk store and a remote-get
    /// collaborator. `local_id` is this node's overlay id, handed to the
    /// collaborator when issuing retrieve requests.
    pub fn new(
        config: NetStoreConfig,
        store: DynChunkStore,
        remote_get: DynRemoteGet,
        local_id: PeerId,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.fetcher_cache_capacity)
            .expect("fetcher cache capacity must be non-zero");
        Self {
            inner: Arc::new(Inner {
                store,
                remote_get,
                local_id,
                fetchers: Mutex::new(LruCache::new(capacity)),
                search_timeout: config.search_timeout(),
            }),
            request_group: RequestGroup::new(),
            global_timeout: config.global_timeout(),
        }
    }

    /// Return the fetcher for an address missing locally, installing a new
    /// one when no party asked for it yet.
    ///
    /// The boolean is false when the caller should issue its own retrieve:
    /// either the fetcher is new, or it was created by the other party and
    /// no cross-party request has been made yet.
    pub fn get_or_create_fetcher(
        &self,
        address: &Address,
        party: FetchParty,
    ) -> (Arc<Fetcher>, bool) {
        self.inner.get_or_create_fetcher(address, party)
    }

    /// Run the remote fetch loop for an address until its fetcher reports
    /// a delivery or a terminal condition.
    pub async fn remote_fetch(
        &self,
        request: Arc<Request>,
        fetcher: Arc<Fetcher>,
    ) -> ShoalResult<Chunk> {
        self.inner.remote_fetch(request, fetcher).await
    }

    #[cfg(test)]
    fn fetcher_count(&self) -> usize {
        self.inner.fetchers.lock().expect("poisoned").len()
    }
}

impl std::fmt::Debug for NetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetStore")
            .field("local_id", &self.inner.local_id)
            .field(
                "fetchers",
                &self.inner.fetchers.lock().expect("poisoned").len(),
            )
            .finish()
    }
}

impl Inner {
    fn get_or_create_fetcher(
        &self,
        address: &Address,
        party: FetchParty,
    ) -> (Arc<Fetcher>, bool) {
        let mut fetchers = self.fetchers.lock().expect("poisoned");
        let key = address.to_string();
        let (fetcher, loaded) = match fetchers.get(&key) {
            Some(fetcher) => (fetcher.clone(), true),
            None => {
                let fetcher = Arc::new(Fetcher::new(party));
                fetchers.put(key, fetcher.clone());
                (fetcher, false)
            }
        };
        tracing::trace!(
            %address, %party, loaded, created_by = %fetcher.created_by(),
            "get or create fetcher",
        );

        // a fetcher created by one party still owes the other party its
        // own retrieve, exactly once
        if fetcher.created_by() != party && !fetcher.requested_by_syncer() {
            fetcher.set_requested_by_syncer();
            return (fetcher, false);
        }

        (fetcher, loaded)
    }

    async fn remote_fetch(
        &self,
        request: Arc<Request>,
        fetcher: Arc<Fetcher>,
    ) -> ShoalResult<Chunk> {
        let address = request.address().clone();
        loop {
            tracing::trace!(%address, "remote fetch");

            let (peer, cleanup) = match self
                .remote_get
                .next_peer(request.clone(), self.local_id.clone())
                .await
            {
                Ok(out) => out,
                Err(err) => {
                    tracing::trace!(%address, %err, "remote get gave up");
                    return Err(ShoalError::NoSuitablePeer);
                }
            };

            // this peer has been asked now; a retry must rotate onward
            tracing::trace!(%address, %peer, "remote fetch, adding peer to skip");
            request.skip_peer(&peer);

            let delivery =
                tokio::time::timeout(self.search_timeout, fetcher.delivered())
                    .await;
            cleanup();
            match delivery {
                Ok(chunk) => {
                    tracing::trace!(%address, "remote fetch, chunk delivered");
                    return Ok(chunk);
                }
                Err(_) => {
                    tracing::trace!(%address, %peer, "remote fetch, search timed out");
                }
            }
        }
    }
}

impl shoal_api::NetStore for NetStore {
    fn get(
        &self,
        mode: ModeGet,
        request: Arc<Request>,
    ) -> BoxFut<'_, ShoalResult<Chunk>> {
        Box::pin(async move {
            let address = request.address().clone();

            match self.inner.store.get(mode, address.clone()).await {
                Ok(chunk) => {
                    tracing::trace!(%address, "netstore get, local hit");
                    return Ok(chunk);
                }
                Err(ShoalError::NotFound) => {
                    tracing::trace!(%address, "chunk not in local store");
                }
                Err(err) => {
                    tracing::error!(%address, %err, "local store get error");
                    return Err(err);
                }
            }

            let inner = self.inner.clone();
            let global_timeout = self.global_timeout;
            let out = self
                .request_group
                .run(&address.to_string(), move || {
                    Box::pin(async move {
                        let (fetcher, _loaded) = inner.get_or_create_fetcher(
                            request.address(),
                            FetchParty::Request,
                        );
                        match tokio::time::timeout(
                            global_timeout,
                            inner.remote_fetch(request, fetcher),
                        )
                        .await
                        {
                            Ok(out) => out,
                            Err(_) => Err(ShoalError::timeout(
                                "global fetch deadline",
                            )),
                        }
                    })
                })
                .await;

            tracing::trace!(
                %address,
                ok = out.is_ok(),
                "netstore get, coalesced fetch returned",
            );
            out
        })
    }

    fn put(
        &self,
        mode: ModePut,
        chunks: Vec<Chunk>,
    ) -> BoxFut<'_, ShoalResult<Vec<bool>>> {
        Box::pin(async move {
            // release everyone waiting on these addresses before touching
            // the local store
            {
                let mut fetchers =
                    self.inner.fetchers.lock().expect("poisoned");
                for chunk in &chunks {
                    let key = chunk.address().to_string();
                    if let Some(fetcher) = fetchers.get(&key) {
                        tracing::trace!(
                            address = %chunk.address(), ?mode,
                            "netstore put, delivering to fetcher",
                        );
                        fetcher.safe_close(chunk.clone());
                    }
                }
            }

            let exists = self.inner.store.put(mode, chunks.clone()).await?;

            let mut fetchers = self.inner.fetchers.lock().expect("poisoned");
            for chunk in &chunks {
                let key = chunk.address().to_string();
                if let Some(fetcher) = fetchers.pop(&key) {
                    let lifetime = fetcher.created_at().elapsed();
                    if lifetime > SLOW_CHUNK_DELIVERY {
                        tracing::debug!(
                            address = %chunk.address(),
                            ?lifetime,
                            created_by = %fetcher.created_by(),
                            "netstore put, slow chunk delivery",
                        );
                    }
                }
            }

            Ok(exists)
        })
    }

    fn has(&self, address: Address) -> BoxFut<'_, ShoalResult<bool>> {
        self.inner.store.has(address)
    }

    fn close(&self) -> BoxFut<'_, ShoalResult<()>> {
        self.inner.store.close()
    }
}

#[cfg(test)]
mod test;
