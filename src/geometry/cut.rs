//! Slice-plane cut and projection filters
//!
//! These are the 2D pipeline stages of the slice views: intersect a surface
//! with the slice plane (contour segments), flatten geometry into slice
//! coordinates, and encode signed plane distance as a color ramp.

use glam::{Mat4, Vec3};

use super::mesh::PolyMesh;
use super::plane::Plane;

/// Line segments produced by cutting a surface with a plane
#[derive(Debug, Clone, Default)]
pub struct PlaneCut {
    pub points: Vec<Vec3>,
    pub segments: Vec<[u32; 2]>,
}

impl PlaneCut {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() || self.segments.is_empty()
    }
}

/// Cuts a triangle mesh with a plane, producing intersection segments
pub fn cut_with_plane(mesh: &PolyMesh, plane: &Plane) -> PlaneCut {
    let dist: Vec<f32> = mesh
        .points
        .iter()
        .map(|&p| plane.signed_distance(p))
        .collect();
    let mut cut = PlaneCut::default();

    for tri in &mesh.triangles {
        let idx = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let mut crossings: Vec<Vec3> = Vec::with_capacity(2);
        for e in 0..3 {
            let (a, b) = (idx[e], idx[(e + 1) % 3]);
            let (da, db) = (dist[a], dist[b]);
            if (da <= 0.0) != (db <= 0.0) {
                let t = da / (da - db);
                crossings.push(mesh.points[a].lerp(mesh.points[b], t));
            }
        }
        if crossings.len() == 2 {
            let base = cut.points.len() as u32;
            cut.points.push(crossings[0]);
            cut.points.push(crossings[1]);
            cut.segments.push([base, base + 1]);
        }
    }
    cut
}

/// Flattens world-space points into slice coordinates (z forced to 0)
///
/// `ras_to_slice` is the inverse of the slice-to-RAS matrix; the returned
/// points live in the slice plane's 2D frame.
pub fn flatten_to_slice(points: &[Vec3], ras_to_slice: &Mat4) -> Vec<Vec3> {
    points
        .iter()
        .map(|&p| {
            let s = ras_to_slice.transform_point3(p);
            Vec3::new(s.x, s.y, 0.0)
        })
        .collect()
}

/// Signed plane distances of a point set
pub fn signed_distances(points: &[Vec3], plane: &Plane) -> Vec<f32> {
    points.iter().map(|&p| plane.signed_distance(p)).collect()
}

/// Maps signed distances through a two-color ramp over [-range, +range]
///
/// Distance zero lands exactly on the ramp midpoint, so the plane-crossing
/// line of a distance-encoded projection always shows the midpoint color.
pub fn distance_encoded_colors(
    distances: &[f32],
    range: f32,
    below: Vec3,
    above: Vec3,
) -> Vec<Vec3> {
    let range = range.max(f32::EPSILON);
    distances
        .iter()
        .map(|&d| {
            let t = ((d + range) / (2.0 * range)).clamp(0.0, 1.0);
            below.lerp(above, t)
        })
        .collect()
}

/// Ramp color at distance zero
pub fn ramp_midpoint(below: Vec3, above: Vec3) -> Vec3 {
    below.lerp(above, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_cube_with_midplane() {
        let cube = PolyMesh::cube(Vec3::ZERO, 1.0);
        let plane = Plane::new(Vec3::ZERO, Vec3::Z);
        let cut = cut_with_plane(&cube, &plane);
        assert!(!cut.is_empty());
        for p in &cut.points {
            assert!(p.z.abs() < 1e-5);
        }
        // Each of the 8 side triangles crosses the midplane once.
        assert_eq!(cut.segments.len(), 8);
    }

    #[test]
    fn test_cut_misses_mesh() {
        let cube = PolyMesh::cube(Vec3::ZERO, 1.0);
        let plane = Plane::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        assert!(cut_with_plane(&cube, &plane).is_empty());
    }

    #[test]
    fn test_distance_colors_zero_is_midpoint() {
        let below = Vec3::new(0.0, 0.0, 1.0);
        let above = Vec3::new(1.0, 1.0, 0.0);
        let colors = distance_encoded_colors(&[0.0, -10.0, 10.0], 10.0, below, above);
        assert_eq!(colors[0], ramp_midpoint(below, above));
        assert_eq!(colors[1], below);
        assert_eq!(colors[2], above);
    }

    #[test]
    fn test_flatten_drops_plane_normal_axis() {
        let slice_to_ras = Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0));
        let ras_to_slice = slice_to_ras.inverse();
        let flat = flatten_to_slice(&[Vec3::new(1.0, 2.0, 7.0)], &ras_to_slice);
        assert_eq!(flat[0], Vec3::new(1.0, 2.0, 0.0));
    }
}
