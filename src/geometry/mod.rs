//! Geometry containers and the pipeline filter stages managers assemble

pub mod clip;
pub mod cut;
pub mod mesh;
pub mod plane;

pub use clip::{clip_mesh, clip_poly_mesh, extract_grid_cells, extract_poly_cells, ClipMethod};
pub use cut::{
    cut_with_plane, distance_encoded_colors, flatten_to_slice, ramp_midpoint, signed_distances,
    PlaneCut,
};
pub use mesh::{Bounds, Mesh, PointScalars, PolyMesh, UnstructuredGrid};
pub use plane::{ClipCombine, ClipSide, Plane, SliceClipFunction};
