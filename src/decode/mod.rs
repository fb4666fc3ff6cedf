//! Longest Edge Bisection decoding
//!
//! Triangles are never stored. A heap id *is* the split history of its cell:
//! the bits below the leading one, read most- to least-significant, replay
//! the bisections that produced it from a base triangle. Decoding is pure
//! arithmetic, so every worker can recompute any triangle independently.
//!
//! Convention: the long edge of a triangle is `v1`–`v2` and `v0` is the apex.
//! Each bisection replaces the triangle with one half and relabels so the
//! long edge sits at `v1`–`v2` again; this fixed relabeling is what keeps
//! repeated bisection inside a bounded family of shapes instead of
//! degenerating into slivers.

use glam::Vec2;

use crate::heap::NodeId;
use crate::TessellationError;

/// A decoded cell in parametric space.
///
/// `v1`–`v2` is the long edge; `v0` the apex. Derived per frame, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Triangle {
    /// Apex, opposite the long edge.
    pub v0: Vec2,
    /// First endpoint of the long edge.
    pub v1: Vec2,
    /// Second endpoint of the long edge.
    pub v2: Vec2,
}

impl Triangle {
    /// Construct from apex and long-edge endpoints.
    pub fn new(v0: Vec2, v1: Vec2, v2: Vec2) -> Self {
        Self { v0, v1, v2 }
    }

    /// Unsigned area.
    pub fn area(&self) -> f32 {
        0.5 * (self.v1 - self.v0).perp_dot(self.v2 - self.v0).abs()
    }

    /// Midpoint of the long edge, i.e. the bisection point.
    #[inline]
    pub fn long_edge_midpoint(&self) -> Vec2 {
        0.5 * (self.v1 + self.v2)
    }

    /// One bisection step.
    ///
    /// `bit = false` keeps the half containing `v1`, `bit = true` the half
    /// containing `v2`. The midpoint becomes the child's apex and the cut
    /// parent edge becomes the child's long edge.
    #[inline]
    pub fn bisect(&self, bit: bool) -> Triangle {
        let m = self.long_edge_midpoint();
        if bit {
            Triangle::new(m, self.v2, self.v0)
        } else {
            Triangle::new(m, self.v0, self.v1)
        }
    }
}

/// The canonical root triangles seeding a tree instance.
///
/// With `2^k` primitives, the k bits below an id's leading one select the
/// primitive and the remaining bits replay bisection. Terrain uses two
/// triangles tiling the unit square (ids 2 and 3 below a virtual root);
/// subdivision surfaces use one triangle per half-edge face.
#[derive(Debug, Clone)]
pub struct BasePrimitives {
    triangles: Vec<Triangle>,
    root_depth: u32,
}

impl BasePrimitives {
    /// A single root triangle at id 1.
    pub fn single(triangle: Triangle) -> Self {
        Self {
            triangles: vec![triangle],
            root_depth: 0,
        }
    }

    /// Two base triangles tiling the unit square along the (0,0)–(1,1)
    /// diagonal, at ids 2 and 3. Id 1 is a virtual root and never active.
    pub fn unit_square() -> Self {
        Self {
            triangles: vec![
                Triangle::new(Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)),
                Triangle::new(Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 0.0)),
            ],
            root_depth: 1,
        }
    }

    /// Arbitrary base mesh; the count must be a nonzero power of two.
    pub fn new(triangles: Vec<Triangle>) -> Result<Self, TessellationError> {
        if triangles.is_empty() || !triangles.len().is_power_of_two() {
            return Err(TessellationError::BasePrimitiveCount(triangles.len()));
        }
        let root_depth = triangles.len().trailing_zeros();
        Ok(Self {
            triangles,
            root_depth,
        })
    }

    /// Depth of the base-primitive level; nodes above it are virtual.
    #[inline]
    pub fn root_depth(&self) -> u32 {
        self.root_depth
    }

    /// Number of base triangles.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Whether the base mesh is empty (never true for a constructed value).
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Decode a heap id to its triangle by replaying the bisection path.
    ///
    /// Deterministic: the same id always yields bit-identical vertices.
    /// Precondition: `id.depth() >= root_depth()`.
    pub fn decode(&self, id: NodeId) -> Triangle {
        let depth = id.depth();
        debug_assert!(depth >= self.root_depth, "id above the base level");
        let path_len = depth - self.root_depth;
        let prim = (id.0 >> path_len) - (1 << self.root_depth);
        let mut triangle = self.triangles[prim as usize];
        for k in (0..path_len).rev() {
            triangle = triangle.bisect(id.0 >> k & 1 == 1);
        }
        triangle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_root() -> Triangle {
        // Right isoceles, hypotenuse on the long-edge slot.
        Triangle::new(Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0))
    }

    #[test]
    fn test_children_tile_parent() {
        let root = unit_root();
        let left = root.bisect(false);
        let right = root.bisect(true);
        let m = root.long_edge_midpoint();
        assert_eq!(left.v0, m);
        assert_eq!(right.v0, m);
        let total = left.area() + right.area();
        assert!((total - root.area()).abs() < 1e-6);
        assert!((left.area() - right.area()).abs() < 1e-6);
    }

    #[test]
    fn test_long_edge_stays_longest() {
        // The relabeling invariant: after any path, v1-v2 is the longest side.
        let mut triangle = unit_root();
        for step in 0..12u32 {
            let long = triangle.v1.distance(triangle.v2);
            assert!(long >= triangle.v0.distance(triangle.v1) - 1e-6);
            assert!(long >= triangle.v0.distance(triangle.v2) - 1e-6);
            triangle = triangle.bisect(step & 1 == 1);
        }
    }

    #[test]
    fn test_decode_replays_bisection() {
        let base = BasePrimitives::single(unit_root());
        assert_eq!(base.decode(NodeId(2)), unit_root().bisect(false));
        assert_eq!(base.decode(NodeId(3)), unit_root().bisect(true));
        assert_eq!(base.decode(NodeId(5)), unit_root().bisect(false).bisect(true));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let base = BasePrimitives::unit_square();
        let id = NodeId(0b110101);
        let a = base.decode(id);
        let b = base.decode(id);
        assert_eq!(a.v0, b.v0);
        assert_eq!(a.v1, b.v1);
        assert_eq!(a.v2, b.v2);
    }

    #[test]
    fn test_unit_square_primitive_selection() {
        let base = BasePrimitives::unit_square();
        assert_eq!(base.root_depth(), 1);
        let diag_mid = Vec2::new(0.5, 0.5);
        assert_eq!(base.decode(NodeId(2)).long_edge_midpoint(), diag_mid);
        assert_eq!(base.decode(NodeId(3)).long_edge_midpoint(), diag_mid);
        let total = base.decode(NodeId(2)).area() + base.decode(NodeId(3)).area();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_depth_halves_area() {
        let base = BasePrimitives::unit_square();
        for raw in [4u32, 9, 21, 47] {
            let id = NodeId(raw);
            let expected = 0.5 / (1u32 << (id.depth() - 1)) as f32;
            assert!((base.decode(id).area() - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_base_count_must_be_power_of_two() {
        let t = unit_root();
        assert!(BasePrimitives::new(vec![t; 3]).is_err());
        assert!(BasePrimitives::new(vec![]).is_err());
        assert_eq!(BasePrimitives::new(vec![t; 4]).unwrap().root_depth(), 2);
    }
}
