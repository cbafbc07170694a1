//! The network store contract: local-first chunk resolution with remote
//! fallback.

use crate::{
    builder::Builder, config::Config, Address, BoxFut, Chunk, DynChunkStore,
    DynRemoteGet, ModeGet, ModePut, PeerId, Request, ShoalResult,
};
use std::sync::Arc;

/// Which flow is interested in a missing chunk.
///
/// A fetcher remembers the party that created it so that a later request
/// from the other party can still trigger its own retrieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchParty {
    /// A retrieve request.
    Request,
    /// The syncing protocol's offered/wanted flow.
    Syncing,
}

impl std::fmt::Display for FetchParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchParty::Request => f.write_str("request"),
            FetchParty::Syncing => f.write_str("syncing"),
        }
    }
}

/// Tuning for a [NetStore] instance.
///
/// Lives in the top-level [Config](crate::config::Config) under the
/// `netStore` key; missing properties fall back to these defaults.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetStoreConfig {
    /// How long one remote attempt waits for a delivery before rotating
    /// to another peer, in milliseconds. Default: 1000.
    pub search_timeout_ms: u64,

    /// Ceiling on one whole remote fetch effort, in milliseconds.
    /// Default: 10000.
    pub global_timeout_ms: u64,

    /// Capacity of the fetcher table; cold entries are evicted and their
    /// waiters run into the deadline. Default: 500000.
    pub fetcher_cache_capacity: usize,
}

impl Default for NetStoreConfig {
    fn default() -> Self {
        Self {
            search_timeout_ms: 1000,
            global_timeout_ms: 10_000,
            fetcher_cache_capacity: 500_000,
        }
    }
}

impl NetStoreConfig {
    /// The per-attempt search timeout.
    pub fn search_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.search_timeout_ms)
    }

    /// The global fetch deadline.
    pub fn global_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.global_timeout_ms)
    }
}

/// A store resolving chunks locally first and from remote peers on a miss.
///
/// Concurrent gets for the same missing address share one outbound fetch
/// effort; remote deliveries come back exclusively through [NetStore::put].
pub trait NetStore: 'static + Send + Sync + std::fmt::Debug {
    /// Resolve a chunk: local store first, then the remote fetch path.
    ///
    /// Only a local [NotFound](crate::ShoalError::NotFound) miss falls
    /// through to the network; any other local failure is terminal.
    fn get(
        &self,
        mode: ModeGet,
        request: Arc<Request>,
    ) -> BoxFut<'_, ShoalResult<Chunk>>;

    /// Write chunks to the local store, first releasing any waiters parked
    /// on their addresses. Returns, per chunk, whether it was already
    /// present.
    fn put(
        &self,
        mode: ModePut,
        chunks: Vec<Chunk>,
    ) -> BoxFut<'_, ShoalResult<Vec<bool>>>;

    /// Whether the local store holds a chunk for this address.
    fn has(&self, address: Address) -> BoxFut<'_, ShoalResult<bool>>;

    /// Close the underlying local store.
    fn close(&self) -> BoxFut<'_, ShoalResult<()>>;
}

/// Trait-object version of the net store.
pub type DynNetStore = Arc<dyn NetStore>;

/// A factory for creating NetStore instances.
pub trait NetStoreFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Validate the parts of the configuration this factory consumes.
    fn validate_config(&self, config: &Config) -> ShoalResult<()>;

    /// Construct a NetStore over a local store and a remote-get
    /// collaborator.
    fn create(
        &self,
        builder: Arc<Builder>,
        chunk_store: DynChunkStore,
        remote_get: DynRemoteGet,
        local_id: PeerId,
    ) -> BoxFut<'static, ShoalResult<DynNetStore>>;
}

/// Trait-object version of the net store factory.
pub type DynNetStoreFactory = Arc<dyn NetStoreFactory>;
