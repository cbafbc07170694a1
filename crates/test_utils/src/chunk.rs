//! Chunk fixtures carrying true BMT addresses.

use bytes::{BufMut, Bytes, BytesMut};
use rand::RngCore;
use shoal_api::{length_to_span, Address, Chunk, SEGMENT_COUNT, SPAN_SIZE};
use shoal_bmt::{Keccak256Hasher, RefHasher, SegmentHasher};

/// Span-prefix a payload into chunk data.
pub fn chunk_data(payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(SPAN_SIZE + payload.len());
    out.put_slice(&length_to_span(payload.len() as u64));
    out.put_slice(payload);
    out.freeze()
}

/// Span-prefixed chunk data over a random payload.
pub fn random_chunk_data(payload_len: usize) -> Bytes {
    let mut payload = vec![0_u8; payload_len];
    rand::thread_rng().fill_bytes(&mut payload);
    chunk_data(&payload)
}

/// The BMT address of span-prefixed chunk data, computed through the
/// reference hasher.
pub fn address_of(data: &[u8]) -> Address {
    let root = RefHasher::<Keccak256Hasher>::new(SEGMENT_COUNT)
        .hash(&data[SPAN_SIZE..]);
    Address::from(Keccak256Hasher::hash_all(&[&data[..SPAN_SIZE], &root]))
}

/// Seal chunk data into a correctly addressed chunk.
pub fn chunk(data: Bytes) -> Chunk {
    Chunk::new(address_of(&data), data).expect("valid fixture data")
}

/// A correctly addressed chunk over a random payload.
pub fn random_chunk(payload_len: usize) -> Chunk {
    chunk(random_chunk_data(payload_len))
}
