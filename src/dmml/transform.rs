//! Transform nodes and transform-to-world composition
//!
//! A transform node holds either a linear 4x4 matrix or a general
//! displacement-field warp, plus an optional parent transform, forming a
//! chain. "Transform to world" composes the chain root-first; a run of
//! linear transforms collapses into a single matrix, while any displacement
//! in the chain forces point-wise application.

use std::cell::RefCell;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use super::node::{NodeBase, NodeId};

/// Regular-grid displacement field with trilinear interpolation
///
/// Samples outside the grid clamp to the border, so the warp smoothly
/// degrades to the border displacement instead of extrapolating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplacementField {
    pub origin: Vec3,
    pub spacing: Vec3,
    pub dims: [u32; 3],
    /// Row-major grid of displacement vectors, x fastest
    pub vectors: Vec<Vec3>,
}

impl DisplacementField {
    fn vector_at_index(&self, i: u32, j: u32, k: u32) -> Vec3 {
        let [nx, ny, _] = self.dims;
        self.vectors[(k * ny * nx + j * nx + i) as usize]
    }

    /// Trilinearly interpolated displacement at a world position
    pub fn displacement_at(&self, p: Vec3) -> Vec3 {
        let [nx, ny, nz] = self.dims;
        if nx == 0 || ny == 0 || nz == 0 || self.vectors.is_empty() {
            return Vec3::ZERO;
        }
        let rel = (p - self.origin) / self.spacing;
        let fx = rel.x.clamp(0.0, (nx - 1) as f32);
        let fy = rel.y.clamp(0.0, (ny - 1) as f32);
        let fz = rel.z.clamp(0.0, (nz - 1) as f32);
        let i0 = fx.floor() as u32;
        let j0 = fy.floor() as u32;
        let k0 = fz.floor() as u32;
        let i1 = (i0 + 1).min(nx - 1);
        let j1 = (j0 + 1).min(ny - 1);
        let k1 = (k0 + 1).min(nz - 1);
        let tx = fx - i0 as f32;
        let ty = fy - j0 as f32;
        let tz = fz - k0 as f32;

        let c000 = self.vector_at_index(i0, j0, k0);
        let c100 = self.vector_at_index(i1, j0, k0);
        let c010 = self.vector_at_index(i0, j1, k0);
        let c110 = self.vector_at_index(i1, j1, k0);
        let c001 = self.vector_at_index(i0, j0, k1);
        let c101 = self.vector_at_index(i1, j0, k1);
        let c011 = self.vector_at_index(i0, j1, k1);
        let c111 = self.vector_at_index(i1, j1, k1);

        let c00 = c000.lerp(c100, tx);
        let c10 = c010.lerp(c110, tx);
        let c01 = c001.lerp(c101, tx);
        let c11 = c011.lerp(c111, tx);
        let c0 = c00.lerp(c10, ty);
        let c1 = c01.lerp(c11, ty);
        c0.lerp(c1, tz)
    }
}

/// A single transform stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Transform {
    Linear(Mat4),
    Displacement(DisplacementField),
}

impl Transform {
    /// Applies this transform to a point
    pub fn apply_point(&self, p: Vec3) -> Vec3 {
        match self {
            Transform::Linear(m) => m.transform_point3(p),
            Transform::Displacement(field) => p + field.displacement_at(p),
        }
    }

    /// True if this is a linear stage
    pub fn is_linear(&self) -> bool {
        matches!(self, Transform::Linear(_))
    }
}

/// Composed transform-to-world of a whole chain
#[derive(Debug, Clone)]
pub enum WorldTransform {
    Identity,
    Linear(Mat4),
    /// Stages in application order (innermost first)
    General(Vec<Transform>),
}

impl WorldTransform {
    /// Composes a chain given innermost-first stages
    pub fn compose(stages: Vec<Transform>) -> Self {
        if stages.is_empty() {
            return WorldTransform::Identity;
        }
        if stages.iter().all(Transform::is_linear) {
            // Outermost stage multiplies last: world = m_outer * ... * m_inner.
            let mut world = Mat4::IDENTITY;
            for stage in &stages {
                if let Transform::Linear(m) = stage {
                    world = *m * world;
                }
            }
            return WorldTransform::Linear(world);
        }
        WorldTransform::General(stages)
    }

    /// Applies the composition to a point
    pub fn apply_point(&self, p: Vec3) -> Vec3 {
        match self {
            WorldTransform::Identity => p,
            WorldTransform::Linear(m) => m.transform_point3(p),
            WorldTransform::General(stages) => {
                stages.iter().fold(p, |acc, t| t.apply_point(acc))
            }
        }
    }

    /// Returns the single matrix if the whole chain is linear
    pub fn as_linear(&self) -> Option<Mat4> {
        match self {
            WorldTransform::Identity => Some(Mat4::IDENTITY),
            WorldTransform::Linear(m) => Some(*m),
            WorldTransform::General(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct WorldCache {
    pub epoch: u64,
    pub world: WorldTransform,
}

/// Node holding one stage of a transform chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformNode {
    pub base: NodeBase,
    pub transform: Transform,
    /// Cached composition to world, stamped with the scene transform epoch
    #[serde(skip)]
    pub(crate) world_cache: RefCell<Option<WorldCache>>,
}

impl TransformNode {
    /// Creates a linear transform node
    pub fn linear(name: impl Into<String>, matrix: Mat4) -> Self {
        Self {
            base: NodeBase::named(name),
            transform: Transform::Linear(matrix),
            world_cache: RefCell::new(None),
        }
    }

    /// Creates a displacement-field transform node
    pub fn displacement(name: impl Into<String>, field: DisplacementField) -> Self {
        Self {
            base: NodeBase::named(name),
            transform: Transform::Displacement(field),
            world_cache: RefCell::new(None),
        }
    }

    /// Parent transform of this node, by ID
    pub fn parent(&self) -> Option<&NodeId> {
        self.base.parent_transform.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_composition_order() {
        let translate = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let scale = Mat4::from_scale(Vec3::splat(2.0));
        // Inner scale, outer translate: p' = T * S * p.
        let world = WorldTransform::compose(vec![
            Transform::Linear(scale),
            Transform::Linear(translate),
        ]);
        let p = world.apply_point(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(p, Vec3::new(3.0, 2.0, 2.0));
        assert!(world.as_linear().is_some());
    }

    #[test]
    fn test_displacement_field_trilinear() {
        // 2x1x1 grid: displacement grows linearly along x.
        let field = DisplacementField {
            origin: Vec3::ZERO,
            spacing: Vec3::ONE,
            dims: [2, 1, 1],
            vectors: vec![Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0)],
        };
        let d = field.displacement_at(Vec3::new(0.5, 0.0, 0.0));
        assert!((d.y - 1.0).abs() < 1e-6);
        // Outside the grid clamps to the border value.
        let d = field.displacement_at(Vec3::new(5.0, 0.0, 0.0));
        assert!((d.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_general_chain_applies_in_order() {
        let field = DisplacementField {
            origin: Vec3::ZERO,
            spacing: Vec3::ONE,
            dims: [1, 1, 1],
            vectors: vec![Vec3::new(0.0, 0.0, 1.0)],
        };
        let world = WorldTransform::compose(vec![
            Transform::Displacement(field),
            Transform::Linear(Mat4::from_scale(Vec3::splat(2.0))),
        ]);
        assert!(world.as_linear().is_none());
        let p = world.apply_point(Vec3::ZERO);
        assert_eq!(p, Vec3::new(0.0, 0.0, 2.0));
    }
}
