//! Mesh containers for displayable geometry
//!
//! Two payload shapes exist: triangle surfaces and tetrahedral volumes.
//! Volumes render through their boundary surface; clipping distinguishes the
//! two (surfaces can be straight-cut, volumes extract whole cells).

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Named per-point scalar array (e.g. a probed intensity or a label value)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointScalars {
    pub name: String,
    pub values: Vec<f32>,
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// Grows the box to contain a point
    pub fn expand(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Merges another box into this one
    pub fn union(&mut self, other: &Bounds) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Box of a point set, None when empty
    pub fn of_points(points: &[Vec3]) -> Option<Bounds> {
        let first = *points.first()?;
        let mut bounds = Bounds { min: first, max: first };
        for &p in &points[1..] {
            bounds.expand(p);
        }
        Some(bounds)
    }

    /// The eight corner points
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }
}

/// Triangle surface mesh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolyMesh {
    pub points: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    pub scalars: Option<PointScalars>,
}

impl PolyMesh {
    /// True if there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() || self.triangles.is_empty()
    }

    /// Bounding box of the point set
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of_points(&self.points)
    }

    /// Axis-aligned quad centered at `origin`, spanned by `u` and `v`
    ///
    /// Used for slice-plane proxy models shown in the 3D view.
    pub fn plane_quad(origin: Vec3, u: Vec3, v: Vec3) -> PolyMesh {
        PolyMesh {
            points: vec![
                origin - u - v,
                origin + u - v,
                origin + u + v,
                origin - u + v,
            ],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
            scalars: None,
        }
    }

    /// Unit-ish cube centered at `center` with half-extent `half`
    pub fn cube(center: Vec3, half: f32) -> PolyMesh {
        let h = Vec3::splat(half);
        let b = Bounds { min: center - h, max: center + h };
        let points = b.corners().to_vec();
        // 12 triangles, outward winding.
        let triangles = vec![
            [0, 2, 1], [1, 2, 3], // -z
            [4, 5, 6], [5, 7, 6], // +z
            [0, 1, 4], [1, 5, 4], // -y
            [2, 6, 3], [3, 6, 7], // +y
            [0, 4, 2], [2, 4, 6], // -x
            [1, 3, 5], [3, 7, 5], // +x
        ];
        PolyMesh { points, triangles, scalars: None }
    }
}

/// Tetrahedral volume mesh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnstructuredGrid {
    pub points: Vec<Vec3>,
    pub tetrahedra: Vec<[u32; 4]>,
}

impl UnstructuredGrid {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() || self.tetrahedra.is_empty()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of_points(&self.points)
    }

    /// Extracts the boundary surface: faces referenced by exactly one cell
    pub fn surface(&self) -> PolyMesh {
        let mut face_count: HashMap<[u32; 3], ([u32; 3], u32)> = HashMap::new();
        for tet in &self.tetrahedra {
            let faces = [
                [tet[0], tet[1], tet[2]],
                [tet[0], tet[1], tet[3]],
                [tet[0], tet[2], tet[3]],
                [tet[1], tet[2], tet[3]],
            ];
            for face in faces {
                let mut key = face;
                key.sort_unstable();
                face_count
                    .entry(key)
                    .and_modify(|(_, n)| *n += 1)
                    .or_insert((face, 1));
            }
        }
        let triangles: Vec<[u32; 3]> = face_count
            .into_values()
            .filter(|(_, n)| *n == 1)
            .map(|(face, _)| face)
            .collect();
        PolyMesh {
            points: self.points.clone(),
            triangles,
            scalars: None,
        }
    }
}

/// Geometry payload of a displayable node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Mesh {
    Surface(PolyMesh),
    Volume(UnstructuredGrid),
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        match self {
            Mesh::Surface(m) => m.is_empty(),
            Mesh::Volume(g) => g.is_empty(),
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            Mesh::Surface(m) => m.bounds(),
            Mesh::Volume(g) => g.bounds(),
        }
    }

    /// Renderable triangle surface of the payload
    pub fn render_surface(&self) -> PolyMesh {
        match self {
            Mesh::Surface(m) => m.clone(),
            Mesh::Volume(g) => g.surface(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_bounds() {
        let cube = PolyMesh::cube(Vec3::ZERO, 1.0);
        let b = cube.bounds().unwrap();
        assert_eq!(b.min, Vec3::splat(-1.0));
        assert_eq!(b.max, Vec3::splat(1.0));
        assert_eq!(cube.triangles.len(), 12);
    }

    #[test]
    fn test_grid_surface_of_single_tet() {
        let grid = UnstructuredGrid {
            points: vec![
                Vec3::ZERO,
                Vec3::X,
                Vec3::Y,
                Vec3::Z,
            ],
            tetrahedra: vec![[0, 1, 2, 3]],
        };
        // All four faces are boundary faces.
        assert_eq!(grid.surface().triangles.len(), 4);
    }

    #[test]
    fn test_grid_surface_shares_interior_face() {
        let grid = UnstructuredGrid {
            points: vec![
                Vec3::ZERO,
                Vec3::X,
                Vec3::Y,
                Vec3::Z,
                Vec3::new(1.0, 1.0, 1.0),
            ],
            tetrahedra: vec![[0, 1, 2, 3], [1, 2, 3, 4]],
        };
        // 8 faces total, one shared: 6 boundary faces remain.
        assert_eq!(grid.surface().triangles.len(), 6);
    }
}
