//! Split/merge classification
//!
//! Per-leaf, per-frame decision: project the leaf triangle's long edge to
//! screen space and compare its pixel length against the split and merge
//! thresholds. The gap between the two thresholds is the hysteresis band
//! that keeps the tessellation from oscillating between frames.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::heap::NodeId;
use crate::decode::Triangle;
use crate::TessellationConfig;

/// Clip-space w below which a vertex counts as behind the near plane.
const NEAR_EPS: f32 = 1e-6;

/// Transient per-leaf decision, valid for one update pass only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Leave the leaf as it is.
    Keep,
    /// Replace the leaf with its two children.
    Split,
    /// Ask to merge with the sibling. Applied only if the sibling
    /// independently asks too.
    MergeRequest,
}

/// Per-frame camera inputs.
#[derive(Debug, Clone, Copy)]
pub struct ViewParams {
    /// Combined view-projection transform.
    pub view_proj: Mat4,
    /// Render target size in pixels.
    pub viewport: Vec2,
}

/// Stateless screen-space-error classifier.
#[derive(Debug, Clone, Copy)]
pub struct SplitMergeClassifier {
    split_px: f32,
    merge_px: f32,
    max_depth: u32,
    root_depth: u32,
}

impl SplitMergeClassifier {
    /// Build a classifier from the tessellation config and the depth of the
    /// base-primitive level (leaves never merge above it).
    pub fn new(config: &TessellationConfig, root_depth: u32) -> Self {
        Self {
            split_px: config.split_threshold_px,
            merge_px: config.merge_threshold_px,
            max_depth: config.max_depth,
            root_depth,
        }
    }

    /// Classify one leaf.
    ///
    /// `lift` maps parametric coordinates to world space (for terrain this
    /// is where height sampling happens). A split request at `max_depth` is
    /// clamped to [`Intent::Keep`]; so is any edge with an endpoint behind
    /// the near plane, since its screen length is meaningless.
    pub fn classify<F>(&self, id: NodeId, triangle: &Triangle, view: &ViewParams, lift: &F) -> Intent
    where
        F: Fn(Vec2) -> Vec3,
    {
        let depth = id.depth();
        let Some(edge_px) = self.long_edge_pixels(triangle, view, lift) else {
            return Intent::Keep;
        };

        if edge_px > self.split_px && depth < self.max_depth {
            Intent::Split
        } else if edge_px < self.merge_px && depth > self.root_depth {
            Intent::MergeRequest
        } else {
            Intent::Keep
        }
    }

    /// Screen-space length of the long edge, or None if either endpoint is
    /// behind the near plane.
    fn long_edge_pixels<F>(&self, triangle: &Triangle, view: &ViewParams, lift: &F) -> Option<f32>
    where
        F: Fn(Vec2) -> Vec3,
    {
        let a = self.project(lift(triangle.v1), view)?;
        let b = self.project(lift(triangle.v2), view)?;
        Some(a.distance(b))
    }

    fn project(&self, world: Vec3, view: &ViewParams) -> Option<Vec2> {
        let clip = view.view_proj * Vec4::new(world.x, world.y, world.z, 1.0);
        if clip.w <= NEAR_EPS {
            return None;
        }
        let ndc = Vec2::new(clip.x, clip.y) / clip.w;
        Some(ndc * 0.5 * view.viewport)
    }
}
