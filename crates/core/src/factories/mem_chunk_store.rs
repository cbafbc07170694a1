//! The in-memory chunk store implementation provided by shoal.

use shoal_api::{
    builder::Builder, config::Config, Address, BoxFut, Chunk, ChunkStore,
    ChunkStoreFactory, DynChunkStore, DynChunkStoreFactory, ModeGet,
    ModePut, ModeSet, ShoalError, ShoalResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;


/// The mem chunk store factory provided by shoal.
#[derive(Debug)]
pub struct MemChunkStoreFactory {}

impl MemChunkStoreFactory {
    /// Construct a new MemChunkStoreFactory.
    pub fn create() -> DynChunkStoreFactory {
        let out: DynChunkStoreFactory = Arc::new(MemChunkStoreFactory {});
        out
    }
}

impl ChunkStoreFactory for MemChunkStoreFactory {
    fn validate_config(&self, _config: &Config) -> ShoalResult<()> {
        Ok(())
    }

    fn create(
        &self,
        _builder: Arc<Builder>,
    ) -> BoxFut<'static, ShoalResult<DynChunkStore>> {
        Box::pin(async move { Ok(MemChunkStore::create()) })
    }
}

/// A chunk store over a plain in-memory map.
///
/// Useful for testing and for ephemeral nodes; a real deployment persists
/// chunks in an embedded index. The put/get/set modes only matter for a
/// store that does GC bookkeeping, so they are accepted and ignored here.
#[derive(Debug, Default)]
pub struct MemChunkStore {
    chunks: RwLock<HashMap<Address, Chunk>>,
}

impl MemChunkStore {
    /// Create a new MemChunkStore.
    pub fn create() -> DynChunkStore {
        Arc::new(MemChunkStore::default())
    }
}

impl ChunkStore for MemChunkStore {
    fn put(
        &self,
        _mode: ModePut,
        chunks: Vec<Chunk>,
    ) -> BoxFut<'_, ShoalResult<Vec<bool>>> {
        Box::pin(async move {
            let mut lock = self.chunks.write().await;
            let mut exists = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                exists.push(
                    lock.insert(chunk.address().clone(), chunk).is_some(),
                );
            }
            Ok(exists)
        })
    }

    fn get(
        &self,
        _mode: ModeGet,
        address: Address,
    ) -> BoxFut<'_, ShoalResult<Chunk>> {
        Box::pin(async move {
            self.chunks
                .read()
                .await
                .get(&address)
                .cloned()
                .ok_or(ShoalError::NotFound)
        })
    }

    fn has(&self, address: Address) -> BoxFut<'_, ShoalResult<bool>> {
        Box::pin(
            async move { Ok(self.chunks.read().await.contains_key(&address)) },
        )
    }

    fn set(
        &self,
        _mode: ModeSet,
        _addresses: Vec<Address>,
    ) -> BoxFut<'_, ShoalResult<()>> {
        Box::pin(async move { Ok(()) })
    }

    fn close(&self) -> BoxFut<'_, ShoalResult<()>> {
        Box::pin(async move { Ok(()) })
    }
}
