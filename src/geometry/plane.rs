//! Plane math and the composed slice-clip implicit function
//!
//! Clipping keeps the region where the implicit function is non-positive.
//! Each enabled slice plane contributes a signed half-space term; the three
//! terms combine by intersection (max) or union (min).

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Oriented plane in RAS space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub origin: Vec3,
    /// Unit normal
    pub normal: Vec3,
}

impl Plane {
    /// Plane with a normalized copy of the given normal
    pub fn new(origin: Vec3, normal: Vec3) -> Self {
        Self {
            origin,
            normal: normal.normalize_or_zero(),
        }
    }

    /// Plane of a slice node: origin is the matrix translation, normal the
    /// third column of the slice-to-RAS rotation
    pub fn from_slice_to_ras(slice_to_ras: &Mat4) -> Self {
        let normal = slice_to_ras.transform_vector3(Vec3::Z);
        let origin = slice_to_ras.transform_point3(Vec3::ZERO);
        Plane::new(origin, normal)
    }

    /// Signed distance, positive on the normal side
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        (p - self.origin).dot(self.normal)
    }

    /// In-plane basis vectors (u, v) orthogonal to the normal
    pub fn basis(&self) -> (Vec3, Vec3) {
        let u = self.normal.any_orthonormal_vector();
        let v = self.normal.cross(u).normalize_or_zero();
        (u, v)
    }
}

/// Which half-space of a slice plane clipping keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipSide {
    /// This plane does not participate in clipping
    Off,
    /// Keep the positive-normal half-space
    PositiveSpace,
    /// Keep the negative-normal half-space
    NegativeSpace,
}

/// Boolean combination of the enabled clip planes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipCombine {
    /// Keep points inside every enabled half-space
    Intersection,
    /// Keep points inside at least one enabled half-space
    Union,
}

/// Composed implicit function of up to three slice planes
#[derive(Debug, Clone)]
pub struct SliceClipFunction {
    /// (plane, keep-positive-half-space)
    pub planes: Vec<(Plane, bool)>,
    pub combine: ClipCombine,
}

impl SliceClipFunction {
    /// True when no plane participates
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Implicit value at a point; non-positive means "kept"
    pub fn eval(&self, p: Vec3) -> f32 {
        let mut acc: Option<f32> = None;
        for (plane, keep_positive) in &self.planes {
            let d = plane.signed_distance(p);
            let inside = if *keep_positive { -d } else { d };
            acc = Some(match (acc, self.combine) {
                (None, _) => inside,
                (Some(a), ClipCombine::Intersection) => a.max(inside),
                (Some(a), ClipCombine::Union) => a.min(inside),
            });
        }
        acc.unwrap_or(-1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_distance() {
        let plane = Plane::new(Vec3::ZERO, Vec3::Z);
        assert_eq!(plane.signed_distance(Vec3::new(0.0, 0.0, 2.0)), 2.0);
        assert_eq!(plane.signed_distance(Vec3::new(1.0, 1.0, -3.0)), -3.0);
    }

    #[test]
    fn test_plane_from_slice_matrix() {
        let m = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let plane = Plane::from_slice_to_ras(&m);
        assert_eq!(plane.normal, Vec3::Z);
        assert_eq!(plane.origin, Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_single_plane_negative_space() {
        let f = SliceClipFunction {
            planes: vec![(Plane::new(Vec3::ZERO, Vec3::Z), false)],
            combine: ClipCombine::Intersection,
        };
        // Negative half-space is kept.
        assert!(f.eval(Vec3::new(0.0, 0.0, -1.0)) <= 0.0);
        assert!(f.eval(Vec3::new(0.0, 0.0, 1.0)) > 0.0);
    }

    #[test]
    fn test_union_vs_intersection() {
        let planes = vec![
            (Plane::new(Vec3::ZERO, Vec3::Z), true),
            (Plane::new(Vec3::ZERO, Vec3::X), true),
        ];
        let p = Vec3::new(-1.0, 0.0, 1.0); // inside +z, outside +x
        let inter = SliceClipFunction { planes: planes.clone(), combine: ClipCombine::Intersection };
        let union = SliceClipFunction { planes, combine: ClipCombine::Union };
        assert!(inter.eval(p) > 0.0);
        assert!(union.eval(p) <= 0.0);
    }
}
