//! The local chunk store contract.
//!
//! The embedded key-value index behind this trait is a collaborator: shoal
//! only specifies what it must do. The put/get/set modes let the store keep
//! its garbage-collection bookkeeping straight; they do not change the
//! semantics the core relies on.

use crate::{builder::Builder, config::Config, Address, BoxFut, Chunk, ShoalResult};
use std::sync::Arc;

/// How a chunk is entering the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModePut {
    /// The chunk was produced by a local upload session.
    Upload,
    /// The chunk arrived through the syncing protocol.
    Sync,
    /// The chunk was delivered in response to a retrieve request.
    Request,
}

/// Why a chunk is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeGet {
    /// A retrieve request, local or on behalf of a peer.
    Request,
    /// The syncing protocol reading chunks to offer.
    Sync,
}

/// Advisory state changes on stored chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSet {
    /// Protect the chunks from garbage collection.
    Pin,
    /// Lift a previous pin.
    Unpin,
    /// Record an access for GC recency bookkeeping.
    Access,
}

/// The API a local chunk store must implement to back the shoal core.
pub trait ChunkStore: 'static + Send + Sync + std::fmt::Debug {
    /// Durably write chunks. Returns, per chunk, whether it was already
    /// present.
    fn put(
        &self,
        mode: ModePut,
        chunks: Vec<Chunk>,
    ) -> BoxFut<'_, ShoalResult<Vec<bool>>>;

    /// Read a chunk by address. Must fail with
    /// [ShoalError::NotFound](crate::ShoalError::NotFound) for a missing
    /// address so callers can distinguish a miss from a store fault.
    fn get(
        &self,
        mode: ModeGet,
        address: Address,
    ) -> BoxFut<'_, ShoalResult<Chunk>>;

    /// Whether the store holds a chunk for this address.
    fn has(&self, address: Address) -> BoxFut<'_, ShoalResult<bool>>;

    /// Apply an advisory state change to the given addresses.
    fn set(
        &self,
        mode: ModeSet,
        addresses: Vec<Address>,
    ) -> BoxFut<'_, ShoalResult<()>>;

    /// Release the store's resources.
    fn close(&self) -> BoxFut<'_, ShoalResult<()>>;
}

/// Trait-object version of the chunk store.
pub type DynChunkStore = Arc<dyn ChunkStore>;

/// A factory for creating ChunkStore instances.
pub trait ChunkStoreFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Validate the parts of the configuration this factory consumes.
    fn validate_config(&self, config: &Config) -> ShoalResult<()>;

    /// Construct a ChunkStore instance.
    fn create(
        &self,
        builder: Arc<Builder>,
    ) -> BoxFut<'static, ShoalResult<DynChunkStore>>;
}

/// Trait-object version of the chunk store factory.
pub type DynChunkStoreFactory = Arc<dyn ChunkStoreFactory>;
