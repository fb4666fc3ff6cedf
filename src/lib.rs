//! # Concurrent Binary Tree Tessellation
//!
//! This library implements the adaptive-tessellation core of a real-time
//! terrain/surface renderer: a Concurrent Binary Tree (CBT) stored as a
//! flat bit-packed buffer, refined and coarsened in parallel by a
//! view-dependent screen-space error metric.
//!
//! ## Core Algorithm
//!
//! 1. **Bit heap**: one bit per node of a complete binary tree; active
//!    leaves form a valid partition of the base mesh
//! 2. **Sum reduction**: per-subtree leaf counts, rebuilt level-by-level in
//!    parallel, giving O(1) leaf counts and O(log D) index mapping
//! 3. **Longest Edge Bisection**: a heap id decodes to exact triangle
//!    coordinates by replaying its bit path from a base triangle
//! 4. **Four-phase update**: classify → apply → reduce → enumerate, with a
//!    barrier between phases and no locks inside them
//!
//! ## Usage Example
//!
//! ```ignore
//! use tessera::{BasePrimitives, Tessellator, TessellationConfig, ViewParams};
//!
//! let mut tess = Tessellator::new(
//!     TessellationConfig::default(),
//!     BasePrimitives::unit_square(),
//! )?;
//! let stats = tess.update(&view, &|uv| height_sampler(uv));
//! let triangles = tess.leaf_triangles();
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

// Core modules - dependency order
pub mod heap; // Bit-packed tree storage + node arithmetic
pub mod reduction; // Parallel sum reduction and index mapping
pub mod decode; // Longest Edge Bisection geometry
pub mod classify; // Screen-space split/merge heuristic
pub mod update; // Four-phase per-frame orchestration
pub mod heightfield; // Procedural terrain collaborator for demos/tests

// Re-exports for convenience
pub use classify::{Intent, SplitMergeClassifier, ViewParams};
pub use decode::{BasePrimitives, Triangle};
pub use heap::{BitHeap, NodeId};
pub use reduction::SumReductionTree;
pub use update::{Tessellator, UpdateStats};

use thiserror::Error;

/// Deepest supported tree. Memory grows as `2^(max_depth + 1)` bits for the
/// heap plus `2^(max_depth + 1)` u32 counts for the reduction tree.
pub const MAX_SUPPORTED_DEPTH: u32 = 24;

/// Configuration for a tessellation instance.
///
/// Defaults follow the terrain renderer: depth 20, 24 px split / 8 px merge
/// hysteresis, uniform seed at depth 6 (64 triangles).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TessellationConfig {
    /// Maximum subdivision depth D; bounds memory and worst-case leaf count.
    pub max_depth: u32,

    /// Depth of the uniform seed tessellation.
    pub init_depth: u32,

    /// Screen-space edge length (pixels) above which a leaf splits.
    pub split_threshold_px: f32,

    /// Screen-space edge length (pixels) below which a leaf asks to merge.
    /// Must stay below the split threshold to leave a hysteresis band.
    pub merge_threshold_px: f32,
}

impl Default for TessellationConfig {
    fn default() -> Self {
        Self {
            max_depth: 20,
            init_depth: 6,
            split_threshold_px: 24.0,
            merge_threshold_px: 8.0,
        }
    }
}

impl TessellationConfig {
    /// Check depth bounds and threshold hysteresis.
    pub fn validate(&self) -> Result<(), TessellationError> {
        if self.max_depth == 0 || self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(TessellationError::DepthOutOfRange(self.max_depth));
        }
        if self.init_depth > self.max_depth {
            return Err(TessellationError::InitDepthTooDeep {
                init: self.init_depth,
                max: self.max_depth,
            });
        }
        if self.split_threshold_px <= 0.0 || self.merge_threshold_px <= 0.0 {
            return Err(TessellationError::NonPositiveThreshold(
                self.split_threshold_px.min(self.merge_threshold_px),
            ));
        }
        if self.merge_threshold_px >= self.split_threshold_px {
            return Err(TessellationError::ThresholdsInverted {
                merge: self.merge_threshold_px,
                split: self.split_threshold_px,
            });
        }
        Ok(())
    }
}

/// Errors raised while building a tessellation instance.
///
/// Steady-state operation has no recoverable errors: capacity overflow
/// clamps to keep, index preconditions are debug assertions, and invariant
/// corruption is a fatal internal bug.
#[derive(Error, Debug)]
pub enum TessellationError {
    /// Maximum depth outside `1..=MAX_SUPPORTED_DEPTH`.
    #[error("max depth {0} outside supported range 1..={MAX_SUPPORTED_DEPTH}")]
    DepthOutOfRange(u32),

    /// Seed depth deeper than the maximum depth.
    #[error("init depth {init} exceeds max depth {max}")]
    InitDepthTooDeep {
        /// Requested seed depth.
        init: u32,
        /// Configured maximum depth.
        max: u32,
    },

    /// Seed depth above the base-primitive level (those nodes are virtual).
    #[error("init depth {init} is above the base-primitive level {root}")]
    InitDepthAboveBase {
        /// Requested seed depth.
        init: u32,
        /// Depth of the base-primitive level.
        root: u32,
    },

    /// Merge threshold at or above the split threshold (no hysteresis).
    #[error("merge threshold {merge} px must be below split threshold {split} px")]
    ThresholdsInverted {
        /// Configured merge threshold.
        merge: f32,
        /// Configured split threshold.
        split: f32,
    },

    /// A pixel threshold that is zero or negative.
    #[error("pixel thresholds must be positive, got {0}")]
    NonPositiveThreshold(f32),

    /// Base-primitive count not a nonzero power of two.
    #[error("base primitive count {0} must be a nonzero power of two")]
    BasePrimitiveCount(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TessellationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_hysteresis_enforced() {
        let config = TessellationConfig {
            split_threshold_px: 8.0,
            merge_threshold_px: 24.0,
            ..TessellationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TessellationError::ThresholdsInverted { .. })
        ));
    }

    #[test]
    fn test_depth_bounds() {
        let too_deep = TessellationConfig {
            max_depth: MAX_SUPPORTED_DEPTH + 1,
            ..TessellationConfig::default()
        };
        assert!(too_deep.validate().is_err());

        let shallow_seed = TessellationConfig {
            max_depth: 4,
            init_depth: 6,
            ..TessellationConfig::default()
        };
        assert!(matches!(
            shallow_seed.validate(),
            Err(TessellationError::InitDepthTooDeep { .. })
        ));
    }
}
