//! Per-frame update orchestration
//!
//! Four strictly ordered phases, each internally data-parallel with a
//! fork-join barrier before the next:
//!
//! 1. **Classify**: every current leaf (enumerated from the previous
//!    pass's reduction) is decoded and classified independently.
//! 2. **Apply**: split and mutually-agreed merge edits hit the bit heap in
//!    parallel. Intents derive from the prior partition, so no two edits
//!    touch overlapping bits.
//! 3. **Reduce**: the sum-reduction tree is rebuilt level by level.
//! 4. **Enumerate**: leaves decode to an ordered triangle buffer for the
//!    external renderer.
//!
//! A pass is all-or-nothing; callers that overrun a frame budget skip the
//! pass and reuse the stale tessellation.

use bitvec::prelude::*;
use glam::{Vec2, Vec3};
use rayon::prelude::*;
use tracing::debug;

use crate::classify::{Intent, SplitMergeClassifier, ViewParams};
use crate::decode::{BasePrimitives, Triangle};
use crate::heap::{BitHeap, NodeId};
use crate::reduction::SumReductionTree;
use crate::{TessellationConfig, TessellationError};

/// Counters for one update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateStats {
    /// Leaves replaced by their children.
    pub splits: usize,
    /// Sibling pairs collapsed into their parent.
    pub merges: usize,
    /// Active leaves after the pass.
    pub leaf_count: u32,
}

/// Owner of the tessellation state and driver of the update passes.
#[derive(Debug)]
pub struct Tessellator {
    heap: BitHeap,
    reduction: SumReductionTree,
    base: BasePrimitives,
    classifier: SplitMergeClassifier,
    /// Per-pass merge-consent bitmap, one bit per heap id. Scratch space,
    /// cleared at the start of every pass.
    merge_requests: BitVec,
}

impl Tessellator {
    /// Validate the config and seed a uniform tessellation at
    /// `config.init_depth`.
    pub fn new(config: TessellationConfig, base: BasePrimitives) -> Result<Self, TessellationError> {
        config.validate()?;
        if config.init_depth < base.root_depth() {
            return Err(TessellationError::InitDepthAboveBase {
                init: config.init_depth,
                root: base.root_depth(),
            });
        }

        let heap = BitHeap::with_uniform_depth(config.max_depth, config.init_depth);
        let mut reduction = SumReductionTree::new(config.max_depth);
        reduction.rebuild(&heap);
        let classifier = SplitMergeClassifier::new(&config, base.root_depth());

        Ok(Self {
            merge_requests: bitvec![0; heap.capacity()],
            heap,
            reduction,
            base,
            classifier,
        })
    }

    /// Run one update pass with the built-in screen-space-error classifier.
    ///
    /// `lift` maps parametric coordinates to world space; for terrain this
    /// is where the external height sampler plugs in.
    pub fn update<F>(&mut self, view: &ViewParams, lift: &F) -> UpdateStats
    where
        F: Fn(Vec2) -> Vec3 + Sync,
    {
        let classifier = self.classifier;
        let view = *view;
        self.update_with(|id, triangle| classifier.classify(id, triangle, &view, lift))
    }

    /// Run one update pass with a caller-supplied classifier.
    ///
    /// Merge policy: a pair collapses only when both siblings request it
    /// (a single dissenter keeps both split, so the partition never tears),
    /// and the consenting left child is the sole executor, so each agreed
    /// pair is applied exactly once.
    ///
    /// Out-of-range intents are clamped to `Keep`: a `Split` at `max_depth`
    /// and a `MergeRequest` at or above the base-primitive level are both
    /// ignored and do not appear in the pass stats.
    pub fn update_with<C>(&mut self, classify: C) -> UpdateStats
    where
        C: Fn(NodeId, &Triangle) -> Intent + Sync,
    {
        let leaf_count = self.reduction.leaf_count();
        let max_depth = self.heap.max_depth();
        let root_depth = self.base.root_depth();

        // Phase 1: classify, reading the frozen previous-pass state. The
        // depth clamps are enforced here so the apply phase only ever sees
        // intents the heap can honor.
        let intents: Vec<(NodeId, Intent)> = (0..leaf_count)
            .into_par_iter()
            .map(|leaf| {
                let id = self.reduction.leaf_to_heap(leaf);
                let triangle = self.base.decode(id);
                let intent = match classify(id, &triangle) {
                    Intent::Split if id.depth() >= max_depth => Intent::Keep,
                    Intent::MergeRequest if id.depth() <= root_depth => Intent::Keep,
                    intent => intent,
                };
                (id, intent)
            })
            .collect();

        // Consent bitmap for the mutual-merge check. BitVec writes are not
        // thread-safe, so this short sweep stays sequential.
        self.merge_requests.fill(false);
        for &(id, intent) in &intents {
            if intent == Intent::MergeRequest {
                self.merge_requests.set(id.index(), true);
            }
        }

        let splits = intents
            .iter()
            .filter(|(_, intent)| *intent == Intent::Split)
            .count();
        let merges = intents
            .iter()
            .filter(|&&(id, intent)| {
                intent == Intent::MergeRequest
                    && id.is_left_child()
                    && self.merge_requests[id.sibling().index()]
            })
            .count();

        // Phase 2: apply. Operations derive from a partition, so their bit
        // ranges are disjoint; word-level atomicity is all that is needed.
        {
            let heap = &self.heap;
            let requests = &self.merge_requests;
            intents.par_iter().for_each(|&(id, intent)| match intent {
                Intent::Keep => {}
                Intent::Split => heap.split(id),
                Intent::MergeRequest => {
                    if id.is_left_child() && requests[id.sibling().index()] {
                        heap.merge(id.parent());
                    }
                }
            });
        }

        debug_assert!(
            self.heap.is_valid_cover(self.base.root_depth()),
            "apply phase corrupted the leaf partition"
        );

        // Phase 3: reduce.
        self.reduction.rebuild(&self.heap);

        let stats = UpdateStats {
            splits,
            merges,
            leaf_count: self.reduction.leaf_count(),
        };
        debug!(
            splits = stats.splits,
            merges = stats.merges,
            leaf_count = stats.leaf_count,
            "update pass applied"
        );
        stats
    }

    /// Active leaves in the current tessellation.
    #[inline]
    pub fn leaf_count(&self) -> u32 {
        self.reduction.leaf_count()
    }

    /// Phase 4: decode all leaves into an ordered triangle buffer.
    pub fn leaf_triangles(&self) -> Vec<Triangle> {
        (0..self.reduction.leaf_count())
            .into_par_iter()
            .map(|leaf| self.base.decode(self.reduction.leaf_to_heap(leaf)))
            .collect()
    }

    /// Heap ids of all leaves, in enumeration order.
    pub fn leaf_ids(&self) -> Vec<NodeId> {
        (0..self.reduction.leaf_count())
            .into_par_iter()
            .map(|leaf| self.reduction.leaf_to_heap(leaf))
            .collect()
    }

    /// The persistent bit heap.
    pub fn heap(&self) -> &BitHeap {
        &self.heap
    }

    /// The base mesh seeding this tree.
    pub fn base(&self) -> &BasePrimitives {
        &self.base
    }

    /// The reduction tree of the most recent pass.
    pub fn reduction(&self) -> &SumReductionTree {
        &self.reduction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn tessellator(max_depth: u32, init_depth: u32) -> Tessellator {
        let config = TessellationConfig {
            max_depth,
            init_depth,
            ..TessellationConfig::default()
        };
        let root = Triangle::new(Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0));
        Tessellator::new(config, BasePrimitives::single(root)).unwrap()
    }

    #[test]
    fn test_uniform_seed() {
        let t = tessellator(6, 3);
        assert_eq!(t.leaf_count(), 8);
        assert_eq!(t.leaf_triangles().len(), 8);
    }

    #[test]
    fn test_split_all_doubles_leaves() {
        let mut t = tessellator(6, 3);
        let stats = t.update_with(|_, _| Intent::Split);
        assert_eq!(stats.splits, 8);
        assert_eq!(stats.merges, 0);
        assert_eq!(stats.leaf_count, 16);
    }

    #[test]
    fn test_merge_all_halves_leaves() {
        let mut t = tessellator(6, 3);
        let stats = t.update_with(|_, _| Intent::MergeRequest);
        assert_eq!(stats.splits, 0);
        assert_eq!(stats.merges, 4);
        assert_eq!(stats.leaf_count, 4);
    }

    #[test]
    fn test_split_at_max_depth_clamped_to_keep() {
        let mut t = tessellator(3, 3);
        let before = t.heap().snapshot();
        // Every leaf is already at max depth; the splits must be ignored.
        let stats = t.update_with(|_, _| Intent::Split);
        assert_eq!(stats.splits, 0);
        assert_eq!(stats.leaf_count, 8);
        assert_eq!(t.heap().snapshot(), before);
        assert!(t.heap().is_valid_cover(t.base().root_depth()));
    }

    #[test]
    fn test_merge_at_base_level_clamped_to_keep() {
        let config = TessellationConfig {
            max_depth: 4,
            init_depth: 1,
            ..TessellationConfig::default()
        };
        let mut t = Tessellator::new(config, BasePrimitives::unit_square()).unwrap();
        // Leaves {2,3} are the base primitives themselves; merging them
        // would activate the virtual root.
        let stats = t.update_with(|_, _| Intent::MergeRequest);
        assert_eq!(stats.merges, 0);
        assert_eq!(stats.leaf_count, 2);
        assert!(t.heap().is_valid_cover(t.base().root_depth()));
    }

    #[test]
    fn test_dissenting_sibling_blocks_merge() {
        let mut t = tessellator(4, 2);
        // Leaves {4,5,6,7}: 4 and 5 agree, 7 dissents.
        let stats = t.update_with(|id, _| match id.0 {
            4 | 5 | 6 => Intent::MergeRequest,
            _ => Intent::Keep,
        });
        assert_eq!(stats.merges, 1);
        assert_eq!(stats.leaf_count, 3);
        let ids: Vec<u32> = t.leaf_ids().iter().map(|id| id.0).collect();
        assert_eq!(ids, vec![2, 6, 7]);
    }

    #[test]
    fn test_init_depth_above_base_rejected() {
        let config = TessellationConfig {
            init_depth: 0,
            ..TessellationConfig::default()
        };
        let err = Tessellator::new(config, BasePrimitives::unit_square());
        assert!(matches!(
            err,
            Err(TessellationError::InitDepthAboveBase { .. })
        ));
    }
}
