#![deny(missing_docs)]
//! Binary Merkle Tree hash over fixed size chunks.
//!
//! The BMT hash is the root hash of a binary merkle tree built over fixed
//! size segments of a data chunk, using any 32-byte base hash function
//! (Keccak-256 by default). Chunks with data shorter than the fixed size
//! hash as if they were zero padded, with the padded subtrees replaced by
//! precomputed digests rather than hashed again.
//!
//! Two implementations are provided:
//!
//! * [RefHasher] is optimized for code simplicity and meant as a reference
//!   that is simple to understand
//! * [Hasher] is optimized for speed, dispatching each completed section to
//!   a worker thread and coordinating the concurrent combine steps with a
//!   minimal per-node toggle
//!
//! [Hasher] draws prebuilt tree skeletons from a [TreePool] so repeated
//! chunk hashes amortise allocation, and so the pool capacity bounds how
//! many chunks are hashed concurrently.

/// Size in bytes of one segment, equal to the base hash output size.
pub const SEGMENT_SIZE: usize = 32;

/// Size in bytes of one section, the unit written to the data level of the
/// tree: two segments.
pub const SECTION_SIZE: usize = 2 * SEGMENT_SIZE;

/// Size in bytes of the little-endian length span hashed in front of the
/// tree root to produce the chunk address.
pub const SPAN_SIZE: usize = 8;

/// The segment count used for standard 4096-byte chunks.
pub const DEFAULT_SEGMENT_COUNT: usize = 128;

/// The default number of trees kept by a [TreePool], i.e. the maximum
/// number of chunks one pool hashes concurrently.
pub const DEFAULT_POOL_CAPACITY: usize = 8;

/// One base hash output.
pub type Segment = [u8; SEGMENT_SIZE];

/// Encode a data length as the little-endian span prefix.
pub fn length_to_span(length: u64) -> [u8; SPAN_SIZE] {
    length.to_le_bytes()
}

mod segment;
pub use segment::*;

mod tree;

mod pool;
pub use pool::*;

mod hasher;
pub use hasher::*;

mod reference;
pub use reference::*;
