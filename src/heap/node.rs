//! Implicit heap-node identity
//!
//! A node is just its heap index: root = 1, children of `id` are
//! `2·id` and `2·id + 1`, so the whole tree is navigated with shifts.
//! No node structure is ever stored.

use std::fmt;

/// Heap index of a tree node.
///
/// Valid ids live in `[1, 2^(D+1))` for a tree of maximum depth D.
/// Index 0 is never a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The root node (heap index 1).
    pub const ROOT: NodeId = NodeId(1);

    /// Parent node: `id >> 1`.
    #[inline]
    pub fn parent(self) -> NodeId {
        debug_assert!(!self.is_root(), "root has no parent");
        NodeId(self.0 >> 1)
    }

    /// Left child: `id << 1`.
    #[inline]
    pub fn left_child(self) -> NodeId {
        NodeId(self.0 << 1)
    }

    /// Right child: `(id << 1) | 1`.
    #[inline]
    pub fn right_child(self) -> NodeId {
        NodeId((self.0 << 1) | 1)
    }

    /// The other child of this node's parent.
    #[inline]
    pub fn sibling(self) -> NodeId {
        debug_assert!(!self.is_root(), "root has no sibling");
        NodeId(self.0 ^ 1)
    }

    /// Depth below the root: `bit_length(id) - 1`. Root is depth 0.
    #[inline]
    pub fn depth(self) -> u32 {
        debug_assert!(self.0 != 0, "0 is not a node");
        31 - self.0.leading_zeros()
    }

    /// Whether this is the root node.
    #[inline]
    pub fn is_root(self) -> bool {
        self.0 == 1
    }

    /// Whether this node is its parent's left child.
    #[inline]
    pub fn is_left_child(self) -> bool {
        self.0 & 1 == 0
    }

    /// Raw heap index as a buffer offset.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.0, self.depth())
    }
}
