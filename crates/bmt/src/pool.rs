//! A bounded pool of reusable tree skeletons.

use crate::tree::Tree;
use crate::{Segment, SegmentHasher, SEGMENT_SIZE};
use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex};

struct PoolInner {
    idle: Vec<Arc<Tree>>,
    count: usize,
}

/// A pool of tree skeletons used as resources by the BMT [Hasher].
///
/// A tree taken from the pool is guaranteed to be in a clean state ready
/// for hashing a new chunk: [TreePool::release] resets the skeleton before
/// requeueing it, so [TreePool::reserve] can never hand out a tree whose
/// previous cycle is still visible. Capacity bounds how many chunks are
/// hashed concurrently; reserve blocks once it is reached.
///
/// The pool also precomputes the zero-subtree digest table: `z[0]` is a
/// zero segment and `z[i] = H(z[i-1] ‖ z[i-1])`, so `z[depth]` is the root
/// of an all-zero chunk.
///
/// [Hasher]: crate::Hasher
pub struct TreePool<H: SegmentHasher> {
    inner: Mutex<PoolInner>,
    available: Condvar,
    segment_count: usize,
    capacity: usize,
    depth: usize,
    zero_hashes: Arc<[Segment]>,
    _hasher: PhantomData<fn() -> H>,
}

impl<H: SegmentHasher> TreePool<H> {
    /// Create a pool for chunks of `segment_count` segments holding at
    /// most `capacity` trees.
    ///
    /// `segment_count` must be a power of two of at least 4 (two
    /// sections); `capacity` must be non-zero.
    pub fn new(segment_count: usize, capacity: usize) -> Self {
        assert!(
            segment_count.is_power_of_two() && segment_count >= 4,
            "segment count must be a power of two of at least 4",
        );
        assert!(capacity > 0, "pool capacity must be non-zero");

        let depth = segment_count.trailing_zeros() as usize;
        let mut zero_hashes = Vec::with_capacity(depth + 1);
        let mut zeros: Segment = [0; SEGMENT_SIZE];
        zero_hashes.push(zeros);
        for _ in 1..=depth {
            zeros = H::hash_all(&[&zeros, &zeros]);
            zero_hashes.push(zeros);
        }

        Self {
            inner: Mutex::new(PoolInner {
                idle: Vec::with_capacity(capacity),
                count: 0,
            }),
            available: Condvar::new(),
            segment_count,
            capacity,
            depth,
            zero_hashes: zero_hashes.into(),
            _hasher: PhantomData,
        }
    }

    /// The number of segments on the base level of the trees.
    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// The maximum number of trees, i.e. concurrent chunk hashes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of levels in the trees.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The data capacity of one chunk in bytes.
    pub fn data_size(&self) -> usize {
        self.segment_count * SEGMENT_SIZE
    }

    /// The digest of an all-zero subtree whose root sits at `level`.
    ///
    /// `zero_hash(depth())` is the root of a fully zero chunk.
    pub fn zero_hash(&self, level: usize) -> Segment {
        self.zero_hashes[level]
    }

    /// Take a clean tree, blocking while all `capacity` trees are in use.
    pub(crate) fn reserve(&self) -> Arc<Tree> {
        let mut inner = self.inner.lock().expect("poisoned");
        loop {
            if let Some(tree) = inner.idle.pop() {
                return tree;
            }
            if inner.count < self.capacity {
                inner.count += 1;
                return Arc::new(Tree::new(
                    self.segment_count,
                    self.zero_hashes.clone(),
                ));
            }
            inner = self.available.wait(inner).expect("poisoned");
        }
    }

    /// Reset a tree and give it back to the pool.
    pub(crate) fn release(&self, tree: Arc<Tree>) {
        tree.reset();
        self.inner.lock().expect("poisoned").idle.push(tree);
        self.available.notify_one();
    }

    /// Drop idle trees until at most `keep` remain allocated.
    pub fn drain(&self, keep: usize) {
        let mut inner = self.inner.lock().expect("poisoned");
        while inner.count > keep {
            if inner.idle.pop().is_none() {
                break;
            }
            inner.count -= 1;
        }
    }
}

impl<H: SegmentHasher> std::fmt::Debug for TreePool<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().expect("poisoned");
        f.debug_struct("TreePool")
            .field("segment_count", &self.segment_count)
            .field("capacity", &self.capacity)
            .field("allocated", &inner.count)
            .field("idle", &inner.idle.len())
            .finish()
    }
}
