//! Render actors: the primitives managers instantiate per display node

use glam::{Mat4, Vec3};

use crate::geometry::{Bounds, PolyMesh};

/// Draw-order group; groups draw in declaration order
///
/// Slice-plane proxy surfaces draw before regular geometry so transparent
/// regular models composite correctly over them; view furniture draws last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DrawGroup {
    SliceProxy,
    Regular,
    Furniture,
}

/// Geometry uploaded to one actor
#[derive(Debug, Clone, Default)]
pub struct RenderGeometry {
    pub points: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    pub lines: Vec<[u32; 2]>,
    /// Per-point colors; overrides the flat actor color when present
    pub point_colors: Option<Vec<Vec3>>,
}

impl RenderGeometry {
    /// Triangle geometry from a surface mesh
    pub fn from_poly_mesh(mesh: &PolyMesh) -> Self {
        Self {
            points: mesh.points.clone(),
            triangles: mesh.triangles.clone(),
            lines: Vec::new(),
            point_colors: None,
        }
    }

    /// True if there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() || (self.triangles.is_empty() && self.lines.is_empty())
    }

    /// Bounding box in actor-local coordinates
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of_points(&self.points)
    }
}

/// One render primitive: geometry plus pose and display properties
#[derive(Debug, Clone)]
pub struct Actor {
    pub geometry: RenderGeometry,
    /// Linear pose; non-linear warps are baked into the geometry instead
    pub pose: Mat4,
    pub group: DrawGroup,
    pub visible: bool,
    pub pickable: bool,
    pub color: Vec3,
    pub backface_color: Option<Vec3>,
    pub opacity: f32,
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub specular_power: f32,
    pub line_width: f32,
    /// Text billboard content for label actors (axis labels)
    pub label: Option<String>,
}

impl Actor {
    /// Actor with default display properties
    pub fn new(geometry: RenderGeometry, group: DrawGroup) -> Self {
        Self {
            geometry,
            pose: Mat4::IDENTITY,
            group,
            visible: true,
            pickable: true,
            color: Vec3::splat(0.5),
            backface_color: None,
            opacity: 1.0,
            ambient: 0.0,
            diffuse: 1.0,
            specular: 0.0,
            specular_power: 1.0,
            line_width: 1.0,
            label: None,
        }
    }

    /// Bounding box in world coordinates (pose applied to local bounds)
    pub fn world_bounds(&self) -> Option<Bounds> {
        let local = self.geometry.bounds()?;
        let mut corners = local.corners().into_iter();
        let first = self.pose.transform_point3(corners.next()?);
        let mut bounds = Bounds { min: first, max: first };
        for c in corners {
            bounds.expand(self.pose.transform_point3(c));
        }
        Some(bounds)
    }
}
