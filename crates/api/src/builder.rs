//! Builder-related types.

use crate::*;
use std::sync::Arc;

/// The general shoal builder.
/// This contains both configuration and factory instances,
/// allowing construction of runtime module instances.
pub struct Builder {
    /// The module configuration to be used when building modules.
    /// This can be loaded from disk or modified before freezing the builder.
    pub config: crate::config::Config,

    /// The [ChunkStoreFactory] to be used for creating
    /// [ChunkStore] instances.
    pub chunk_store: DynChunkStoreFactory,

    /// The [NetStoreFactory] to be used for creating
    /// [NetStore] instances.
    pub net_store: DynNetStoreFactory,
}

impl Builder {
    /// Validate the current config against the configured module factories.
    /// Note, this should be called before freezing the Builder instance
    /// in an Arc<>.
    pub fn validate_config(&self) -> ShoalResult<()> {
        let Self {
            config,
            chunk_store,
            net_store,
        } = self;

        chunk_store.validate_config(config)?;
        net_store.validate_config(config)?;

        Ok(())
    }

    /// Freeze the builder so module factories can be invoked against it.
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }
}
