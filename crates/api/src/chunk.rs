//! The chunk: the fixed-maximum-size unit of storage.

use crate::{Address, ShoalError, ShoalResult};
use bytes::Bytes;

/// Size in bytes of one BMT segment, equal to the base hash output size.
pub const SEGMENT_SIZE: usize = 32;

/// Number of segments on the base level of the BMT.
pub const SEGMENT_COUNT: usize = 128;

/// Maximum chunk payload in bytes.
pub const CHUNK_SIZE: usize = SEGMENT_SIZE * SEGMENT_COUNT;

/// Size in bytes of the little-endian length span prefixed to chunk data.
pub const SPAN_SIZE: usize = 8;

/// Encode a data length as the little-endian span prefix.
pub fn length_to_span(length: u64) -> [u8; SPAN_SIZE] {
    length.to_le_bytes()
}

/// Decode a span prefix back into the data length it represents.
///
/// Panics if `span` is shorter than [SPAN_SIZE]; chunk data is validated
/// against that minimum before any span is read.
pub fn span_to_length(span: &[u8]) -> u64 {
    let mut out = [0_u8; SPAN_SIZE];
    out.copy_from_slice(&span[..SPAN_SIZE]);
    u64::from_le_bytes(out)
}

/// A sealed chunk: content address plus span-prefixed data.
///
/// The data layout on the wire and in the store is
/// `span (8 bytes, little-endian u64) ‖ payload (≤ 4096 bytes)`. The span
/// holds the total length of the data subsumed under the subtree this chunk
/// is the root of, which for leaf chunks is simply the payload length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    address: Address,
    data: Bytes,
}

impl Chunk {
    /// Construct a chunk from its address and span-prefixed data.
    ///
    /// The address is trusted here; it is computed (or verified) by the
    /// hasher store before a chunk is sealed.
    pub fn new(address: Address, data: Bytes) -> ShoalResult<Self> {
        validate_chunk_data(&data)?;
        Ok(Self { address, data })
    }

    /// The content address of this chunk.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The full span-prefixed data.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The decoded length span.
    pub fn span(&self) -> u64 {
        span_to_length(&self.data)
    }

    /// The payload bytes after the span prefix.
    pub fn payload(&self) -> &[u8] {
        &self.data[SPAN_SIZE..]
    }
}

/// Check that span-prefixed chunk data is within the wire bounds.
pub fn validate_chunk_data(data: &[u8]) -> ShoalResult<()> {
    if data.len() < SPAN_SIZE {
        return Err(ShoalError::invalid_chunk(format!(
            "min length {} got {}",
            SPAN_SIZE,
            data.len()
        )));
    }
    if data.len() > SPAN_SIZE + CHUNK_SIZE {
        return Err(ShoalError::invalid_chunk(format!(
            "max length {} got {}",
            SPAN_SIZE + CHUNK_SIZE,
            data.len()
        )));
    }
    Ok(())
}
