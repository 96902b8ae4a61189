//! Clip filters
//!
//! Two policies exist. "Straight cut" splits surface triangles exactly at
//! the zero crossing of the implicit function, interpolating edge points and
//! scalars. "Whole cells" keeps only cells entirely inside the kept region,
//! preserving cell integrity at the cost of a jagged boundary. Volume meshes
//! always clip whole-cell (cutting tetrahedra open would expose unclosed
//! geometry).

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::mesh::{Mesh, PointScalars, PolyMesh, UnstructuredGrid};
use super::plane::SliceClipFunction;

/// Clip policy selected on the clip node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipMethod {
    /// Split cells at the exact zero crossing
    StraightCut,
    /// Keep cells entirely inside the kept region
    WholeCells,
}

/// Clips any mesh payload, dispatching on mesh type and policy
pub fn clip_mesh(mesh: &Mesh, f: &SliceClipFunction, method: ClipMethod) -> Mesh {
    match (mesh, method) {
        (Mesh::Surface(m), ClipMethod::StraightCut) => Mesh::Surface(clip_poly_mesh(m, f)),
        (Mesh::Surface(m), ClipMethod::WholeCells) => Mesh::Surface(extract_poly_cells(m, f)),
        (Mesh::Volume(g), _) => Mesh::Volume(extract_grid_cells(g, f)),
    }
}

/// Straight-cut clip of a triangle mesh against an implicit function
///
/// Keeps the region where `f` is non-positive. Crossing triangles are split
/// with edge points interpolated at the linear zero crossing of the
/// per-vertex implicit values (matching how a sampled-scalar clip behaves
/// for non-planar composed functions).
pub fn clip_poly_mesh(mesh: &PolyMesh, f: &SliceClipFunction) -> PolyMesh {
    let values: Vec<f32> = mesh.points.iter().map(|&p| f.eval(p)).collect();
    let mut out = ClipBuilder::new(mesh);

    for tri in &mesh.triangles {
        let idx = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let inside = [values[idx[0]] <= 0.0, values[idx[1]] <= 0.0, values[idx[2]] <= 0.0];
        match inside.iter().filter(|&&b| b).count() {
            3 => {
                let a = out.keep(idx[0]);
                let b = out.keep(idx[1]);
                let c = out.keep(idx[2]);
                out.triangles.push([a, b, c]);
            }
            0 => {}
            n => {
                // Rotate so the configuration is canonical: one vertex on the
                // minority side first.
                let lone_inside = n == 1;
                let lone = (0..3)
                    .find(|&i| inside[i] == lone_inside)
                    .unwrap_or(0);
                let (i0, i1, i2) = (idx[lone], idx[(lone + 1) % 3], idx[(lone + 2) % 3]);
                let p01 = out.edge_point(i0, i1, &values);
                let p02 = out.edge_point(i0, i2, &values);
                if lone_inside {
                    // Tip triangle survives.
                    let a = out.keep(i0);
                    out.triangles.push([a, p01, p02]);
                } else {
                    // Quad opposite the tip survives, split into two.
                    let b = out.keep(i1);
                    let c = out.keep(i2);
                    out.triangles.push([p01, b, c]);
                    out.triangles.push([p01, c, p02]);
                }
            }
        }
    }
    out.finish(mesh)
}

/// Whole-cell clip of a triangle mesh: keeps fully inside triangles
pub fn extract_poly_cells(mesh: &PolyMesh, f: &SliceClipFunction) -> PolyMesh {
    let values: Vec<f32> = mesh.points.iter().map(|&p| f.eval(p)).collect();
    let mut out = ClipBuilder::new(mesh);
    for tri in &mesh.triangles {
        let idx = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if idx.iter().all(|&i| values[i] <= 0.0) {
            let a = out.keep(idx[0]);
            let b = out.keep(idx[1]);
            let c = out.keep(idx[2]);
            out.triangles.push([a, b, c]);
        }
    }
    out.finish(mesh)
}

/// Whole-cell clip of a tetrahedral grid
pub fn extract_grid_cells(grid: &UnstructuredGrid, f: &SliceClipFunction) -> UnstructuredGrid {
    let values: Vec<f32> = grid.points.iter().map(|&p| f.eval(p)).collect();
    let mut remap: Vec<Option<u32>> = vec![None; grid.points.len()];
    let mut points = Vec::new();
    let mut tetrahedra = Vec::new();
    for tet in &grid.tetrahedra {
        if tet.iter().all(|&i| values[i as usize] <= 0.0) {
            let mut mapped = [0u32; 4];
            for (slot, &i) in mapped.iter_mut().zip(tet.iter()) {
                *slot = *remap[i as usize].get_or_insert_with(|| {
                    points.push(grid.points[i as usize]);
                    (points.len() - 1) as u32
                });
            }
            tetrahedra.push(mapped);
        }
    }
    UnstructuredGrid { points, tetrahedra }
}

/// Incremental output mesh that remaps kept vertices and interpolates
/// crossing-edge points
struct ClipBuilder {
    remap: Vec<Option<u32>>,
    points: Vec<Vec3>,
    scalar_values: Vec<f32>,
    triangles: Vec<[u32; 3]>,
    /// (new index, edge endpoints, interpolation parameter)
    pending_edges: Vec<(u32, u32, u32, f32)>,
    has_scalars: bool,
}

impl ClipBuilder {
    fn new(mesh: &PolyMesh) -> Self {
        Self {
            remap: vec![None; mesh.points.len()],
            points: Vec::new(),
            scalar_values: Vec::new(),
            triangles: Vec::new(),
            pending_edges: Vec::new(),
            has_scalars: mesh.scalars.is_some(),
        }
    }

    fn keep(&mut self, i: usize) -> u32 {
        if let Some(mapped) = self.remap[i] {
            return mapped;
        }
        let mapped = self.points.len() as u32;
        self.remap[i] = Some(mapped);
        self.points.push(Vec3::ZERO); // patched in finish()
        self.scalar_values.push(0.0);
        mapped
    }

    fn edge_point(&mut self, a: usize, b: usize, values: &[f32]) -> u32 {
        let (va, vb) = (values[a], values[b]);
        let t = if (va - vb).abs() < f32::EPSILON {
            0.5
        } else {
            (va / (va - vb)).clamp(0.0, 1.0)
        };
        // Crossing points are not shared between triangles; the tiny
        // duplication keeps the builder single-pass.
        let mapped = self.points.len() as u32;
        self.points.push(Vec3::ZERO);
        self.scalar_values.push(t); // placeholder, patched in finish()
        self.pending_edges.push((mapped, a as u32, b as u32, t));
        mapped
    }

    fn finish(mut self, mesh: &PolyMesh) -> PolyMesh {
        // Patch kept-vertex positions and scalars.
        for (src, slot) in self.remap.iter().enumerate() {
            if let Some(mapped) = slot {
                self.points[*mapped as usize] = mesh.points[src];
                if let Some(scalars) = &mesh.scalars {
                    self.scalar_values[*mapped as usize] = scalars.values[src];
                }
            }
        }
        // Patch interpolated edge points.
        let edges = std::mem::take(&mut self.pending_edges);
        for (mapped, a, b, t) in edges {
            let pa = mesh.points[a as usize];
            let pb = mesh.points[b as usize];
            self.points[mapped as usize] = pa.lerp(pb, t);
            if let Some(scalars) = &mesh.scalars {
                let sa = scalars.values[a as usize];
                let sb = scalars.values[b as usize];
                self.scalar_values[mapped as usize] = sa + (sb - sa) * t;
            }
        }
        let scalars = if self.has_scalars {
            mesh.scalars.as_ref().map(|s| PointScalars {
                name: s.name.clone(),
                values: self.scalar_values,
            })
        } else {
            None
        };
        PolyMesh {
            points: self.points,
            triangles: self.triangles,
            scalars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::plane::{ClipCombine, Plane};

    fn z_plane_keep_negative() -> SliceClipFunction {
        SliceClipFunction {
            planes: vec![(Plane::new(Vec3::ZERO, Vec3::Z), false)],
            combine: ClipCombine::Intersection,
        }
    }

    #[test]
    fn test_straight_cut_keeps_half_space() {
        let cube = PolyMesh::cube(Vec3::ZERO, 1.0);
        let clipped = clip_poly_mesh(&cube, &z_plane_keep_negative());
        assert!(!clipped.is_empty());
        for p in &clipped.points {
            assert!(p.z <= 1e-5, "point {p:?} leaked past the clip plane");
        }
        // The cut boundary lies exactly on the plane.
        assert!(clipped.points.iter().any(|p| p.z.abs() < 1e-5));
    }

    #[test]
    fn test_straight_cut_interpolates_scalars() {
        let mut mesh = PolyMesh {
            points: vec![
                Vec3::new(0.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
            ],
            triangles: vec![[0, 1, 2]],
            scalars: None,
        };
        mesh.scalars = Some(PointScalars {
            name: "depth".into(),
            values: vec![-1.0, 1.0, 1.0],
        });
        let clipped = clip_poly_mesh(&mesh, &z_plane_keep_negative());
        let scalars = clipped.scalars.unwrap();
        // Edge points sit at z == 0 where the scalar interpolates to 0.
        for (p, s) in clipped.points.iter().zip(scalars.values.iter()) {
            if p.z.abs() < 1e-5 {
                assert!(s.abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_whole_cells_drops_crossing_triangles() {
        let cube = PolyMesh::cube(Vec3::ZERO, 1.0);
        let kept = extract_poly_cells(&cube, &z_plane_keep_negative());
        // Only the -z face (2 triangles) is fully inside.
        assert_eq!(kept.triangles.len(), 2);
    }

    #[test]
    fn test_grid_whole_cell_extraction() {
        let grid = UnstructuredGrid {
            points: vec![
                Vec3::new(0.0, 0.0, -2.0),
                Vec3::new(1.0, 0.0, -2.0),
                Vec3::new(0.0, 1.0, -2.0),
                Vec3::new(0.0, 0.0, -1.0),
                Vec3::new(0.0, 0.0, 2.0),
            ],
            tetrahedra: vec![[0, 1, 2, 3], [1, 2, 3, 4]],
        };
        let kept = extract_grid_cells(&grid, &z_plane_keep_negative());
        assert_eq!(kept.tetrahedra.len(), 1);
        assert_eq!(kept.points.len(), 4);
    }
}
