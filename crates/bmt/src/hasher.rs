//! The concurrent BMT chunk hasher.

use crate::tree::Tree;
use crate::{
    length_to_span, Segment, SegmentHasher, TreePool, SECTION_SIZE,
    SPAN_SIZE,
};
use std::sync::Arc;

/// A reusable hasher for fixed maximum size chunks representing a BMT.
///
/// - reserves a tree from a [TreePool] for each chunk hash and returns it
///   on [Hasher::sum], leaving hasher and tree reusable for the next chunk
/// - [Hasher::write] is a sequential left-to-right data writer; every
///   completed section is handed to a worker thread, so writing never
///   waits on hashing
/// - the same hasher instance must not be fed more than one chunk at a
///   time; create one hasher per in-flight chunk and share the pool
pub struct Hasher<H: SegmentHasher> {
    pool: Arc<TreePool<H>>,
    tree: Option<Arc<Tree>>,
    cursor: usize,
    offset: usize,
    section: Vec<u8>,
    size: usize,
    span: Option<[u8; SPAN_SIZE]>,
}

impl<H: SegmentHasher> Hasher<H> {
    /// Create a hasher drawing trees from `pool`.
    pub fn new(pool: Arc<TreePool<H>>) -> Self {
        Self {
            pool,
            tree: None,
            cursor: 0,
            offset: 0,
            section: vec![0; SECTION_SIZE],
            size: 0,
            span: None,
        }
    }

    /// Set the length span hashed in front of the root.
    ///
    /// When no span is set, [Hasher::sum] derives it from the number of
    /// bytes written, which is correct for leaf chunks. Chunks carrying
    /// intermediate tree levels represent more data than their payload and
    /// must set the span explicitly.
    pub fn set_span(&mut self, length: u64) {
        self.span = Some(length_to_span(length));
    }

    /// Set the span from its 8-byte wire encoding.
    pub fn set_span_bytes(&mut self, span: &[u8]) {
        let mut out = [0_u8; SPAN_SIZE];
        out.copy_from_slice(&span[..SPAN_SIZE]);
        self.span = Some(out);
    }

    /// Append data to the chunk being hashed.
    ///
    /// Writing more than the pool's data size in one cycle is a contract
    /// violation and panics.
    pub fn write(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        assert!(
            self.size + data.len() <= self.pool.data_size(),
            "chunk overflow: {} + {} exceeds {}",
            self.size,
            data.len(),
            self.pool.data_size(),
        );
        self.size += data.len();

        let mut rest = data;
        loop {
            let free = SECTION_SIZE - self.offset;
            let take = free.min(rest.len());
            self.section[self.offset..self.offset + take]
                .copy_from_slice(&rest[..take]);
            self.offset += take;
            rest = &rest[take..];
            if rest.is_empty() {
                // the last filled section is kept for sum, which needs to
                // dispatch it with the final flag
                return;
            }
            self.dispatch_section(false);
        }
    }

    /// Finish the chunk: returns `H(span ‖ root)` and releases the tree.
    ///
    /// When nothing was written the digest of the all-zero chunk is
    /// returned directly from the pool's lookup table without reserving a
    /// tree.
    pub fn sum(&mut self) -> Segment {
        if self.size == 0 {
            let zero = self.pool.zero_hash(self.pool.depth());
            self.reset();
            return zero;
        }

        let tree = self.tree().clone();
        self.dispatch_section(true);
        let root = tree.wait_result();

        let span = self
            .span
            .unwrap_or_else(|| length_to_span(self.size as u64));
        self.reset();
        H::hash_all(&[&span, &root])
    }

    /// Abandon the current chunk: clears the writer state and returns any
    /// reserved tree to the pool.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.offset = 0;
        self.size = 0;
        self.span = None;
        self.section.fill(0);
        if let Some(tree) = self.tree.take() {
            self.pool.release(tree);
        }
    }

    /// The tree pool backing this hasher.
    pub fn pool(&self) -> &Arc<TreePool<H>> {
        &self.pool
    }

    fn tree(&mut self) -> &Arc<Tree> {
        if self.tree.is_none() {
            self.tree = Some(self.pool.reserve());
        }
        self.tree.as_ref().expect("just reserved")
    }

    /// Hand the current section to a worker thread and open the next one.
    fn dispatch_section(&mut self, is_final: bool) {
        let tree = self.tree().clone();
        let section =
            std::mem::replace(&mut self.section, vec![0; SECTION_SIZE]);
        let index = self.cursor;
        std::thread::spawn(move || {
            write_section::<H>(&tree, index, &section, is_final)
        });
        self.cursor += 1;
        self.offset = 0;
    }
}

impl<H: SegmentHasher> std::fmt::Debug for Hasher<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher")
            .field("cursor", &self.cursor)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}

/// Hash the section at `index` and install the digest on the data level.
fn write_section<H: SegmentHasher>(
    tree: &Tree,
    index: usize,
    section: &[u8],
    is_final: bool,
) {
    let hash = H::hash_all(&[section]);
    let pos = (1, index / 2);
    let is_left = index % 2 == 0;
    if is_final {
        write_final_node::<H>(tree, Some(pos), is_left, Some(hash));
    } else {
        write_node::<H>(tree, Some(pos), is_left, hash);
    }
}

/// Climb the tree from a freshly hashed section.
///
/// The first of two siblings to reach a node parks there; the second
/// combines the pair and continues upward. Whichever worker combines the
/// top node publishes the root.
fn write_node<H: SegmentHasher>(
    tree: &Tree,
    mut pos: Option<(usize, usize)>,
    mut is_left: bool,
    mut seg: Segment,
) {
    loop {
        let Some((level, index)) = pos else {
            tree.send_result(seg);
            return;
        };
        let node = tree.node(level, index);
        if is_left {
            node.set_left(seg);
        } else {
            node.set_right(seg);
        }
        if node.toggle() {
            return;
        }
        let left = node.left().expect("both siblings written");
        let right = node.right().expect("both siblings written");
        seg = H::hash_all(&[&left, &right]);
        is_left = index % 2 == 0;
        pos = tree.parent(level, index);
    }
}

/// Climb the tree from the final section of a short chunk.
///
/// Missing right siblings along the path are the roots of all-zero
/// subtrees and are filled from the pool's lookup table. Where neither a
/// real right child nor a left hash exists the worker propagates "no hash"
/// upward, and the toggle rules are arranged so exactly one worker still
/// reaches the top with the root.
fn write_final_node<H: SegmentHasher>(
    tree: &Tree,
    mut pos: Option<(usize, usize)>,
    mut is_left: bool,
    mut seg: Option<Segment>,
) {
    loop {
        let Some((level, index)) = pos else {
            if let Some(seg) = seg {
                tree.send_result(seg);
            }
            return;
        };
        let node = tree.node(level, index);
        let no_hash;
        if is_left {
            // the final path runs through the left child here, so the
            // right subtree is all zeros and nobody will deliver it
            node.set_right(tree.zero_hash(level));
            if let Some(s) = seg {
                // a left final node carrying a hash is the only worker
                // visiting this node; no toggle, carry the combine upward
                node.set_left(s);
                no_hash = false;
            } else {
                no_hash = node.toggle();
            }
        } else if let Some(s) = seg {
            node.set_right(s);
            no_hash = node.toggle();
        } else {
            // the left sibling worker pair meets at this node; keep
            // propagating "no hash"
            no_hash = true;
        }
        seg = if no_hash {
            None
        } else {
            let left = node.left().expect("both siblings written");
            let right = node.right().expect("both siblings written");
            Some(H::hash_all(&[&left, &right]))
        };
        is_left = index % 2 == 0;
        pos = tree.parent(level, index);
    }
}
