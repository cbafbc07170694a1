//! The base hash primitive the tree is built from.

use crate::Segment;
use sha3::Digest;

/// A 32-byte-output hash usable as the BMT base hash.
///
/// Implementations must be cheap to construct; the tree creates one per
/// hashing step rather than reusing instances across threads.
pub trait SegmentHasher: 'static + Send {
    /// Construct a fresh hasher state.
    fn new() -> Self;

    /// Absorb data.
    fn update(&mut self, data: &[u8]);

    /// Consume the state and produce the digest.
    fn finalize(self) -> Segment;

    /// Hash the concatenation of `parts` in one call.
    fn hash_all(parts: &[&[u8]]) -> Segment
    where
        Self: Sized,
    {
        let mut h = Self::new();
        for p in parts {
            h.update(p);
        }
        h.finalize()
    }
}

/// The default base hash: Keccak-256, the legacy (pre-NIST-padding)
/// variant.
#[derive(Clone)]
pub struct Keccak256Hasher(sha3::Keccak256);

impl SegmentHasher for Keccak256Hasher {
    fn new() -> Self {
        Self(sha3::Keccak256::new())
    }

    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self) -> Segment {
        self.0.finalize().into()
    }
}
