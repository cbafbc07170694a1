#![deny(missing_docs)]
//! Shoal content-addressed chunk storage core.
//!
//! Byte streams are split into chunks of at most 4096 bytes, addressed by
//! a Binary Merkle Tree hash over the span-prefixed payload, optionally
//! encrypted per chunk, written through a bounded producer pipeline and
//! resolved local-first with coalesced remote fetches on a miss. See
//! [shoal_core] for the module implementations and [shoal_api] for the
//! contracts the collaborating overlay and local index must satisfy.

use shoal_api::{builder::Builder, config::Config};

/// Construct a production-ready default builder.
///
/// - `chunk_store` - The default chunk store is
///   [factories::MemChunkStoreFactory]. Persistent deployments supply
///   their own store factory.
/// - `net_store` - The default net store is [factories::NetStoreFactory].
pub fn default_builder() -> Builder {
    Builder {
        config: Config::default(),
        chunk_store: factories::MemChunkStoreFactory::create(),
        net_store: factories::NetStoreFactory::create(),
    }
}

pub mod factories;
