//! The reference BMT implementation.

use crate::{Segment, SegmentHasher, SECTION_SIZE, SEGMENT_SIZE};
use std::marker::PhantomData;

/// The non-concurrent, easy-to-read reference implementation of the BMT
/// root hash.
///
/// It zero-pads the data to the full chunk size and recurses down to
/// section-sized pieces, hashing every level on the way back up. Use it to
/// validate [Hasher](crate::Hasher); it recomputes the zero subtrees
/// instead of substituting precomputed digests, so agreement between the
/// two is meaningful.
pub struct RefHasher<H: SegmentHasher> {
    max_data_length: usize,
    _hasher: PhantomData<fn() -> H>,
}

impl<H: SegmentHasher> RefHasher<H> {
    /// Create a reference hasher for chunks of `segment_count` segments.
    pub fn new(segment_count: usize) -> Self {
        assert!(
            segment_count.is_power_of_two() && segment_count >= 4,
            "segment count must be a power of two of at least 4",
        );
        Self {
            max_data_length: segment_count * SEGMENT_SIZE,
            _hasher: PhantomData,
        }
    }

    /// The BMT root of `data`, which must fit the chunk.
    pub fn hash(&self, data: &[u8]) -> Segment {
        assert!(data.len() <= self.max_data_length, "chunk overflow");
        let mut padded = vec![0_u8; self.max_data_length];
        padded[..data.len()].copy_from_slice(data);
        self.hash_level(&padded)
    }

    fn hash_level(&self, data: &[u8]) -> Segment {
        if data.len() == SECTION_SIZE {
            return H::hash_all(&[data]);
        }
        let half = data.len() / 2;
        let left = self.hash_level(&data[..half]);
        let right = self.hash_level(&data[half..]);
        H::hash_all(&[&left, &right])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Keccak256Hasher;

    #[test]
    fn zero_input_equals_zero_hash_table() {
        // the recursive zero tree and the iterated z-table must agree
        let ref_hasher = RefHasher::<Keccak256Hasher>::new(128);
        let mut z: Segment = [0; SEGMENT_SIZE];
        for _ in 0..7 {
            z = Keccak256Hasher::hash_all(&[&z, &z]);
        }
        assert_eq!(z, ref_hasher.hash(&[]));
    }

    #[test]
    fn short_data_hashes_like_padded_data() {
        let ref_hasher = RefHasher::<Keccak256Hasher>::new(128);
        let data = [7_u8; 100];
        let mut padded = [0_u8; 4096];
        padded[..100].copy_from_slice(&data);
        assert_eq!(ref_hasher.hash(&padded), ref_hasher.hash(&data));
    }

    #[test]
    fn smallest_tree_is_two_sections() {
        let ref_hasher = RefHasher::<Keccak256Hasher>::new(4);
        let data = [1_u8; 128];
        let left = Keccak256Hasher::hash_all(&[&data[..64]]);
        let right = Keccak256Hasher::hash_all(&[&data[64..]]);
        assert_eq!(
            Keccak256Hasher::hash_all(&[&left, &right]),
            ref_hasher.hash(&data),
        );
    }
}
