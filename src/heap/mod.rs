//! Bit-packed concurrent binary tree storage
//!
//! One bit per possible heap node; bit = 1 marks an active leaf. The set of
//! active ids must always form an antichain that covers every root-to-leaf
//! path: a valid, non-overlapping partition of the base mesh.
//!
//! This buffer is the only state that survives across update passes.
//! Everything else (reduction tree, intents, triangles) is derived from it.

mod node;

pub use node::NodeId;

use std::sync::atomic::{AtomicU32, Ordering};

/// Flat bit heap over a complete binary tree of maximum depth D.
///
/// Stores `2^(D+1)` bits in 32-bit words. Bit edits are word-level atomic so
/// that disjoint split/merge operations can run in parallel during the apply
/// phase; Relaxed ordering suffices because phase barriers supply the
/// cross-phase happens-before.
#[derive(Debug)]
pub struct BitHeap {
    words: Box<[AtomicU32]>,
    max_depth: u32,
}

impl BitHeap {
    /// Create an empty heap (no active nodes) for the given maximum depth.
    pub fn new(max_depth: u32) -> Self {
        let bits = 1usize << (max_depth + 1);
        let words = bits.div_ceil(32);
        Self {
            words: (0..words).map(|_| AtomicU32::new(0)).collect(),
            max_depth,
        }
    }

    /// Create a heap with every node of `depth` active: a uniform
    /// tessellation of `2^depth` leaves, the usual seed state.
    pub fn with_uniform_depth(max_depth: u32, depth: u32) -> Self {
        debug_assert!(depth <= max_depth);
        let heap = Self::new(max_depth);
        let first = 1u32 << depth;
        for raw in first..(first << 1) {
            heap.activate(NodeId(raw));
        }
        heap
    }

    /// Maximum tree depth D.
    #[inline]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Number of addressable bits, `2^(D+1)`.
    #[inline]
    pub fn capacity(&self) -> usize {
        1usize << (self.max_depth + 1)
    }

    /// Whether `id` is an active leaf.
    #[inline]
    pub fn is_active(&self, id: NodeId) -> bool {
        let bit = id.index();
        debug_assert!(bit < self.capacity());
        let word = self.words[bit >> 5].load(Ordering::Relaxed);
        word >> (bit & 31) & 1 == 1
    }

    /// Set the bit for `id`.
    #[inline]
    pub fn activate(&self, id: NodeId) {
        let bit = id.index();
        debug_assert!(bit < self.capacity());
        self.words[bit >> 5].fetch_or(1 << (bit & 31), Ordering::Relaxed);
    }

    /// Clear the bit for `id`.
    #[inline]
    pub fn deactivate(&self, id: NodeId) {
        let bit = id.index();
        debug_assert!(bit < self.capacity());
        self.words[bit >> 5].fetch_and(!(1 << (bit & 31)), Ordering::Relaxed);
    }

    /// Split a leaf: clear it, activate both children.
    ///
    /// Caller guarantees `id` is an active leaf with `depth < max_depth` and
    /// that no concurrent operation in the same pass touches these bits.
    #[inline]
    pub fn split(&self, id: NodeId) {
        debug_assert!(id.depth() < self.max_depth, "split at max depth");
        self.deactivate(id);
        self.activate(id.left_child());
        self.activate(id.right_child());
    }

    /// Merge a sibling pair: clear both children, activate their parent.
    ///
    /// Caller guarantees both children of `parent` are active leaves.
    #[inline]
    pub fn merge(&self, parent: NodeId) {
        debug_assert!(parent.depth() < self.max_depth);
        self.deactivate(parent.left_child());
        self.deactivate(parent.right_child());
        self.activate(parent);
    }

    /// Copy the raw word buffer. Used for persistence and exact-state
    /// comparisons in tests.
    pub fn snapshot(&self) -> Vec<u32> {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed))
            .collect()
    }

    /// Iterate active ids in heap order. Linear scan for debug and test
    /// use; per-frame enumeration goes through the reduction tree.
    pub fn active_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (1..self.capacity() as u32)
            .map(NodeId)
            .filter(|&id| self.is_active(id))
    }

    /// Verify the antichain-cover invariant below every base root at
    /// `root_depth`: each root-to-leaf path must hit exactly one active bit.
    ///
    /// O(n) walk; called from debug assertions after the apply phase.
    pub fn is_valid_cover(&self, root_depth: u32) -> bool {
        let first = 1u32 << root_depth;
        (first..(first << 1)).all(|raw| self.covers_subtree(NodeId(raw)))
    }

    fn covers_subtree(&self, id: NodeId) -> bool {
        if self.is_active(id) {
            id.depth() == self.max_depth
                || (self.subtree_clear(id.left_child()) && self.subtree_clear(id.right_child()))
        } else if id.depth() == self.max_depth {
            false
        } else {
            self.covers_subtree(id.left_child()) && self.covers_subtree(id.right_child())
        }
    }

    fn subtree_clear(&self, id: NodeId) -> bool {
        !self.is_active(id)
            && (id.depth() == self.max_depth
                || (self.subtree_clear(id.left_child()) && self.subtree_clear(id.right_child())))
    }
}
