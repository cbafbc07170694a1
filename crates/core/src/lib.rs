#![deny(missing_docs)]
//! Reference implementations of the [Shoal API](shoal_api).
//!
//! The write path runs through [hasher_store::HasherStore]: plaintext chunk
//! payloads are optionally encrypted, BMT-addressed, and handed to a bounded
//! pool of local store writers. The read path runs through
//! [factories::NetStore]: local-first resolution with coalesced remote
//! fetches on a miss.

use shoal_api::{builder::Builder, config::Config};

pub mod encryption;

pub mod hasher_store;

pub mod factories;

/// Construct a default builder for use in tests.
///
/// - `chunk_store` - The default chunk store is
///   [factories::MemChunkStoreFactory].
/// - `net_store` - The default net store is [factories::NetStoreFactory].
pub fn default_test_builder() -> Builder {
    Builder {
        config: Config::default(),
        chunk_store: factories::MemChunkStoreFactory::create(),
        net_store: factories::NetStoreFactory::create(),
    }
}
