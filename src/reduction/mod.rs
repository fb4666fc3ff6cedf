//! Parallel sum-reduction over the bit heap
//!
//! Stores, for every heap id, the number of active leaves in its subtree.
//! The root count is the total leaf count (O(1)); descending by left-subtree
//! counts maps a dense leaf index to its heap id in O(D), and summing
//! left-sibling counts along the ancestor path inverts it.
//!
//! Rebuilt once per update pass: D sequential levels, each level a single
//! data-parallel sweep. Read-only during classify and enumerate.

use rayon::prelude::*;

use crate::heap::{BitHeap, NodeId};

/// Minimum entries per rayon task when sweeping a level.
const PAR_CHUNK: usize = 1024;

/// Per-node active-leaf counts for a [`BitHeap`] of maximum depth D.
#[derive(Debug)]
pub struct SumReductionTree {
    /// `counts[id]` = active leaves in the subtree rooted at `id`.
    /// Index 0 is unused; the array spans `[1, 2^(D+1))`.
    counts: Vec<u32>,
    max_depth: u32,
}

impl SumReductionTree {
    /// Allocate a zeroed reduction tree matching `max_depth`.
    pub fn new(max_depth: u32) -> Self {
        Self {
            counts: vec![0; 1usize << (max_depth + 1)],
            max_depth,
        }
    }

    /// Rebuild all subtree counts from the heap, bottom-up.
    ///
    /// Level k is computed from level k+1 in one parallel sweep; levels run
    /// sequentially from the deepest up to the root. Total work O(n) with
    /// D + 1 sequential steps.
    pub fn rebuild(&mut self, heap: &BitHeap) {
        debug_assert_eq!(heap.max_depth(), self.max_depth);
        let d = self.max_depth;

        // Deepest level has no children: counts are the raw bits.
        let first = 1usize << d;
        self.counts[first..first << 1]
            .par_iter_mut()
            .with_min_len(PAR_CHUNK)
            .enumerate()
            .for_each(|(i, slot)| {
                *slot = heap.is_active(NodeId((first + i) as u32)) as u32;
            });

        for k in (0..d).rev() {
            let first = 1usize << k;
            // Disjoint views: `level` is level k, `deeper` starts at level k+1.
            let (shallow, deeper) = self.counts.split_at_mut(first << 1);
            let deeper: &[u32] = deeper;
            let level = &mut shallow[first..];
            level
                .par_iter_mut()
                .with_min_len(PAR_CHUNK)
                .enumerate()
                .for_each(|(i, slot)| {
                    let own = heap.is_active(NodeId((first + i) as u32)) as u32;
                    *slot = own + deeper[2 * i] + deeper[2 * i + 1];
                });
        }
    }

    /// Total number of active leaves. O(1).
    #[inline]
    pub fn leaf_count(&self) -> u32 {
        self.counts[1]
    }

    /// Active leaves in the subtree rooted at `id`.
    #[inline]
    pub fn subtree_count(&self, id: NodeId) -> u32 {
        self.counts[id.index()]
    }

    /// Map a dense leaf index in `[0, leaf_count())` to its heap id. O(D).
    ///
    /// Descends from the root, stepping right when the left subtree holds
    /// too few leaves. Under the cover invariant a subtree count of 1
    /// identifies an active leaf (covered internal nodes always count >= 2),
    /// so the descent never reads the heap.
    ///
    /// Precondition: `leaf < leaf_count()`. Out-of-range indices are a
    /// caller bug, not a runtime error.
    pub fn leaf_to_heap(&self, leaf: u32) -> NodeId {
        debug_assert!(leaf < self.leaf_count(), "leaf index out of range");
        let mut id = NodeId::ROOT;
        let mut remaining = leaf;
        while self.counts[id.index()] > 1 {
            let left = self.counts[id.left_child().index()];
            if remaining < left {
                id = id.left_child();
            } else {
                remaining -= left;
                id = id.right_child();
            }
        }
        id
    }

    /// Map an active leaf's heap id back to its dense leaf index. O(D).
    ///
    /// Sums the left-sibling subtree counts along the ancestor path.
    pub fn heap_to_leaf(&self, id: NodeId) -> u32 {
        debug_assert_eq!(self.counts[id.index()], 1, "not an active leaf");
        let mut leaf = 0;
        let mut node = id;
        while !node.is_root() {
            if !node.is_left_child() {
                leaf += self.counts[node.sibling().index()];
            }
            node = node.parent();
        }
        leaf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebuilt(heap: &BitHeap) -> SumReductionTree {
        let mut tree = SumReductionTree::new(heap.max_depth());
        tree.rebuild(heap);
        tree
    }

    #[test]
    fn test_leaf_count_matches_brute_force() {
        let heap = BitHeap::with_uniform_depth(6, 4);
        heap.split(NodeId(17));
        heap.split(NodeId(20));
        let tree = rebuilt(&heap);
        assert_eq!(tree.leaf_count() as usize, heap.active_ids().count());
    }

    #[test]
    fn test_subtree_counts_sum_children() {
        let heap = BitHeap::with_uniform_depth(5, 3);
        heap.split(NodeId(9));
        let tree = rebuilt(&heap);
        for raw in 1..16u32 {
            let id = NodeId(raw);
            let own = heap.is_active(id) as u32;
            assert_eq!(
                tree.subtree_count(id),
                own + tree.subtree_count(id.left_child()) + tree.subtree_count(id.right_child())
            );
        }
    }

    #[test]
    fn test_mapping_roundtrip() {
        let heap = BitHeap::with_uniform_depth(6, 3);
        heap.split(NodeId(11));
        heap.split(NodeId(22));
        heap.split(NodeId(14));
        let tree = rebuilt(&heap);
        for leaf in 0..tree.leaf_count() {
            let id = tree.leaf_to_heap(leaf);
            assert!(heap.is_active(id));
            assert_eq!(tree.heap_to_leaf(id), leaf);
        }
    }

    #[test]
    fn test_enumeration_is_heap_ordered_within_depth() {
        // Dense indices follow the left-to-right order of the partition.
        let heap = BitHeap::with_uniform_depth(4, 2);
        let tree = rebuilt(&heap);
        let ids: Vec<u32> = (0..tree.leaf_count())
            .map(|l| tree.leaf_to_heap(l).0)
            .collect();
        assert_eq!(ids, vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_rebuild_after_merge() {
        let heap = BitHeap::with_uniform_depth(4, 2);
        let mut tree = SumReductionTree::new(4);
        tree.rebuild(&heap);
        assert_eq!(tree.leaf_count(), 4);
        heap.merge(NodeId(2));
        tree.rebuild(&heap);
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.leaf_to_heap(0), NodeId(2));
    }
}
