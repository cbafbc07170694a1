//! The reusable tree skeleton coordinating one concurrent chunk hash.

use crate::Segment;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};

/// A node on one of the combine levels of the BMT.
///
/// Each child slot is written by exactly one worker; the toggle decides
/// which of the two siblings combines the pair and climbs on.
pub(crate) struct Node {
    state: AtomicUsize,
    left: Mutex<Option<Segment>>,
    right: Mutex<Option<Segment>>,
}

impl Node {
    fn new() -> Self {
        Self {
            state: AtomicUsize::new(0),
            left: Mutex::new(None),
            right: Mutex::new(None),
        }
    }

    /// Atomic increment mod 2. Returns true for the first arriving sibling,
    /// which parks; the second observes both slots written and combines.
    pub(crate) fn toggle(&self) -> bool {
        self.state.fetch_add(1, Ordering::AcqRel) % 2 == 0
    }

    pub(crate) fn set_left(&self, seg: Segment) {
        *self.left.lock().expect("poisoned") = Some(seg);
    }

    pub(crate) fn set_right(&self, seg: Segment) {
        *self.right.lock().expect("poisoned") = Some(seg);
    }

    pub(crate) fn left(&self) -> Option<Segment> {
        *self.left.lock().expect("poisoned")
    }

    pub(crate) fn right(&self) -> Option<Segment> {
        *self.right.lock().expect("poisoned")
    }

    fn reset(&self) {
        self.state.store(0, Ordering::Release);
        *self.left.lock().expect("poisoned") = None;
        *self.right.lock().expect("poisoned") = None;
    }
}

/// A reusable BMT skeleton.
///
/// The tree is stored as a flat array of nodes covering the combine levels:
/// level 1 receives the section hashes (`segment_count / 4` nodes), each
/// level above halves the count, and the single node of the top level
/// combines into the root, which is published on the result channel.
/// Parent lookup is arithmetic on (level, index) rather than a pointer
/// chase.
pub(crate) struct Tree {
    nodes: Vec<Node>,
    level_offset: Vec<usize>,
    combine_levels: usize,
    zero_hashes: Arc<[Segment]>,
    result_tx: SyncSender<Segment>,
    result_rx: Mutex<Receiver<Segment>>,
}

impl Tree {
    /// Build a clean skeleton for chunks of `segment_count` segments.
    pub(crate) fn new(
        segment_count: usize,
        zero_hashes: Arc<[Segment]>,
    ) -> Self {
        let depth = segment_count.trailing_zeros() as usize;
        let combine_levels = depth - 1;

        let mut nodes = Vec::new();
        // level_offset[0] is unused: level numbering starts at 1
        let mut level_offset = vec![0; combine_levels + 1];
        for level in 1..=combine_levels {
            level_offset[level] = nodes.len();
            for _ in 0..(segment_count >> (level + 1)) {
                nodes.push(Node::new());
            }
        }

        // one result per hash cycle; the send never blocks
        let (result_tx, result_rx) = sync_channel(1);

        Self {
            nodes,
            level_offset,
            combine_levels,
            zero_hashes,
            result_tx,
            result_rx: Mutex::new(result_rx),
        }
    }

    pub(crate) fn node(&self, level: usize, index: usize) -> &Node {
        &self.nodes[self.level_offset[level] + index]
    }

    /// The parent position of a node, or None for the top combine node.
    pub(crate) fn parent(
        &self,
        level: usize,
        index: usize,
    ) -> Option<(usize, usize)> {
        if level == self.combine_levels {
            None
        } else {
            Some((level + 1, index / 2))
        }
    }

    /// The zero-subtree digest substituted for a missing right sibling at
    /// the given combine level.
    pub(crate) fn zero_hash(&self, level: usize) -> Segment {
        self.zero_hashes[level]
    }

    pub(crate) fn send_result(&self, root: Segment) {
        self.result_tx
            .send(root)
            .expect("result receiver lives as long as the tree");
    }

    /// Block until the root of the current hash cycle arrives.
    pub(crate) fn wait_result(&self) -> Segment {
        self.result_rx
            .lock()
            .expect("poisoned")
            .recv()
            .expect("result sender lives as long as the tree")
    }

    /// Return the skeleton to its clean state: slots cleared, toggles zero,
    /// any residual result drained.
    pub(crate) fn reset(&self) {
        for node in &self.nodes {
            node.reset();
        }
        while self.result_rx.lock().expect("poisoned").try_recv().is_ok() {}
    }
}

// Receiver is kept behind a mutex; everything else is sync already.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Tree>();
};
