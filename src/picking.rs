//! Picking: mapping screen/world coordinates back to scene entities
//!
//! Pickers operate on the renderer's actor store and return actor-keyed
//! hits; managers reverse-map the hit actor to a display node through their
//! actor caches. The transient pick state is reset at the start of every
//! pick, and its query surface uses sentinel values (empty string, -1) for
//! "nothing picked".

use glam::{Mat4, Vec3};

use crate::dmml::NodeId;
use crate::render::{ActorId, Ray, Renderer};

/// One pick hit against an actor
#[derive(Debug, Clone, Copy)]
pub struct PickHit {
    pub actor: ActorId,
    /// Hit position in world (RAS) coordinates
    pub world: Vec3,
    /// Index of the hit cell within the actor geometry
    pub cell_id: usize,
    /// Index of the nearest vertex of the hit cell
    pub point_id: usize,
    /// Ray parameter of the hit, for nearest-hit selection
    pub t: f32,
}

/// Möller–Trumbore ray/triangle intersection
fn ray_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    const EPS: f32 = 1e-7;
    let ab = b - a;
    let ac = c - a;
    let pvec = ray.direction.cross(ac);
    let det = ab.dot(pvec);
    if det.abs() < EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = ray.origin - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(ab);
    let v = ray.direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = ac.dot(qvec) * inv_det;
    (t > EPS).then_some(t)
}

fn nearest_vertex(indices: &[u32], points: &[Vec3], pose: &Mat4, world: Vec3) -> usize {
    let mut best = indices[0] as usize;
    let mut best_d = f32::MAX;
    for &i in indices {
        let p = pose.transform_point3(points[i as usize]);
        let d = p.distance_squared(world);
        if d < best_d {
            best_d = d;
            best = i as usize;
        }
    }
    best
}

/// Tolerance-based cell picker: nearest ray/triangle hit over pickable actors
#[derive(Debug, Clone)]
pub struct CellPicker {
    /// World-space tolerance for picking line cells
    pub tolerance: f32,
}

impl Default for CellPicker {
    fn default() -> Self {
        Self { tolerance: 0.5 }
    }
}

impl CellPicker {
    /// Picks the nearest cell along the ray, or None
    pub fn pick(&self, ray: &Ray, renderer: &Renderer) -> Option<PickHit> {
        let mut best: Option<PickHit> = None;
        for (actor_id, actor) in renderer.actors() {
            if !actor.visible || !actor.pickable {
                continue;
            }
            let points = &actor.geometry.points;
            for (cell_id, tri) in actor.geometry.triangles.iter().enumerate() {
                let a = actor.pose.transform_point3(points[tri[0] as usize]);
                let b = actor.pose.transform_point3(points[tri[1] as usize]);
                let c = actor.pose.transform_point3(points[tri[2] as usize]);
                if let Some(t) = ray_triangle(ray, a, b, c) {
                    if best.map_or(true, |h| t < h.t) {
                        let world = ray.origin + ray.direction * t;
                        let point_id = nearest_vertex(tri, points, &actor.pose, world);
                        best = Some(PickHit {
                            actor: actor_id,
                            world,
                            cell_id,
                            point_id,
                            t,
                        });
                    }
                }
            }
            // Line cells pick within the tolerance of the ray.
            for (cell_id, line) in actor.geometry.lines.iter().enumerate() {
                let a = actor.pose.transform_point3(points[line[0] as usize]);
                let b = actor.pose.transform_point3(points[line[1] as usize]);
                if let Some((t, world)) = ray_segment_near(ray, a, b, self.tolerance) {
                    if best.map_or(true, |h| t < h.t) {
                        let point_id = nearest_vertex(line, points, &actor.pose, world);
                        best = Some(PickHit {
                            actor: actor_id,
                            world,
                            cell_id: actor.geometry.triangles.len() + cell_id,
                            point_id,
                            t,
                        });
                    }
                }
            }
        }
        best
    }
}

/// Closest approach of a ray to a segment; hit if within tolerance
fn ray_segment_near(ray: &Ray, a: Vec3, b: Vec3, tolerance: f32) -> Option<(f32, Vec3)> {
    let seg = b - a;
    let seg_len = seg.length();
    if seg_len < f32::EPSILON {
        return None;
    }
    // Sample the segment and keep the closest point to the ray. The segment
    // is short (one triangle crossing), so coarse sampling is adequate.
    let steps = 8;
    let mut best: Option<(f32, Vec3)> = None;
    for i in 0..=steps {
        let p = a + seg * (i as f32 / steps as f32);
        let t = (p - ray.origin).dot(ray.direction);
        if t <= 0.0 {
            continue;
        }
        let on_ray = ray.origin + ray.direction * t;
        if on_ray.distance(p) <= tolerance && best.map_or(true, |(bt, _)| t < bt) {
            best = Some((t, p));
        }
    }
    best
}

/// Point picker: nearest vertex within tolerance of the ray
#[derive(Debug, Clone)]
pub struct PointPicker {
    pub tolerance: f32,
}

impl Default for PointPicker {
    fn default() -> Self {
        Self { tolerance: 1.0 }
    }
}

impl PointPicker {
    /// Picks the nearest vertex along the ray, or None
    pub fn pick(&self, ray: &Ray, renderer: &Renderer) -> Option<PickHit> {
        let mut best: Option<PickHit> = None;
        for (actor_id, actor) in renderer.actors() {
            if !actor.visible || !actor.pickable {
                continue;
            }
            for (point_id, &p) in actor.geometry.points.iter().enumerate() {
                let world = actor.pose.transform_point3(p);
                let t = (world - ray.origin).dot(ray.direction);
                if t <= 0.0 {
                    continue;
                }
                let on_ray = ray.origin + ray.direction * t;
                if on_ray.distance(world) <= self.tolerance
                    && best.map_or(true, |h| t < h.t)
                {
                    best = Some(PickHit {
                        actor: actor_id,
                        world,
                        cell_id: 0,
                        point_id,
                        t,
                    });
                }
            }
        }
        best
    }

    /// Picks the nearest vertex to a world position, within tolerance
    pub fn pick_world(&self, position: Vec3, renderer: &Renderer) -> Option<PickHit> {
        let mut best: Option<PickHit> = None;
        for (actor_id, actor) in renderer.actors() {
            if !actor.visible || !actor.pickable {
                continue;
            }
            for (point_id, &p) in actor.geometry.points.iter().enumerate() {
                let world = actor.pose.transform_point3(p);
                let d = world.distance(position);
                if d <= self.tolerance && best.map_or(true, |h| d < h.t) {
                    best = Some(PickHit {
                        actor: actor_id,
                        world,
                        cell_id: 0,
                        point_id,
                        t: d,
                    });
                }
            }
        }
        best
    }
}

/// Prop picker: first actor whose world bounds the ray enters
#[derive(Debug, Clone, Default)]
pub struct PropPicker;

impl PropPicker {
    pub fn pick(&self, ray: &Ray, renderer: &Renderer) -> Option<(ActorId, Vec3)> {
        let mut best: Option<(f32, ActorId)> = None;
        for (actor_id, actor) in renderer.actors() {
            if !actor.visible || !actor.pickable {
                continue;
            }
            let Some(bounds) = actor.world_bounds() else {
                continue;
            };
            if let Some(t) = ray_aabb(ray, bounds.min, bounds.max) {
                if best.map_or(true, |(bt, _)| t < bt) {
                    best = Some((t, actor_id));
                }
            }
        }
        best.map(|(t, id)| (id, ray.origin + ray.direction * t))
    }
}

/// Slab-method ray/AABB intersection, returning the entry parameter
fn ray_aabb(ray: &Ray, min: Vec3, max: Vec3) -> Option<f32> {
    let inv = ray.direction.recip();
    let t0 = (min - ray.origin) * inv;
    let t1 = (max - ray.origin) * inv;
    let tmin = t0.min(t1);
    let tmax = t0.max(t1);
    let enter = tmin.max_element().max(0.0);
    let exit = tmax.min_element();
    (enter <= exit).then_some(enter)
}

/// Transient result of the last pick operation
#[derive(Debug, Clone, Default)]
pub struct PickState {
    node_id: Option<NodeId>,
    ras: Vec3,
    cell_id: Option<usize>,
    point_id: Option<usize>,
}

impl PickState {
    /// Resets every field to its empty sentinel; true if anything changed
    pub fn reset(&mut self) -> bool {
        let changed = self.node_id.is_some()
            || self.ras != Vec3::ZERO
            || self.cell_id.is_some()
            || self.point_id.is_some();
        *self = PickState::default();
        changed
    }

    /// Fills the state from a resolved hit; true if anything changed
    pub fn set(&mut self, node_id: NodeId, ras: Vec3, cell_id: usize, point_id: usize) -> bool {
        let changed = self.node_id.as_ref() != Some(&node_id)
            || self.ras != ras
            || self.cell_id != Some(cell_id)
            || self.point_id != Some(point_id);
        self.node_id = Some(node_id);
        self.ras = ras;
        self.cell_id = Some(cell_id);
        self.point_id = Some(point_id);
        changed
    }

    /// ID of the picked display node; empty string when nothing was picked
    pub fn picked_node_id(&self) -> &str {
        self.node_id.as_ref().map(NodeId::as_str).unwrap_or("")
    }

    /// Picked position in RAS coordinates
    pub fn picked_ras(&self) -> [f32; 3] {
        self.ras.to_array()
    }

    /// Picked cell index, -1 when nothing was picked
    pub fn picked_cell_id(&self) -> i64 {
        self.cell_id.map_or(-1, |c| c as i64)
    }

    /// Picked point index, -1 when nothing was picked
    pub fn picked_point_id(&self) -> i64 {
        self.point_id.map_or(-1, |p| p as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PolyMesh;
    use crate::render::{Actor, DrawGroup, RenderGeometry};

    fn renderer_with_cube() -> (Renderer, ActorId) {
        let mut renderer = Renderer::new();
        let actor = Actor::new(
            RenderGeometry::from_poly_mesh(&PolyMesh::cube(Vec3::ZERO, 1.0)),
            DrawGroup::Regular,
        );
        let id = renderer.add_actor(actor);
        (renderer, id)
    }

    #[test]
    fn test_cell_pick_hits_front_face() {
        let (renderer, id) = renderer_with_cube();
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 10.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        let hit = CellPicker::default().pick(&ray, &renderer).unwrap();
        assert_eq!(hit.actor, id);
        assert!((hit.world.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_cell_pick_misses_off_axis() {
        let (renderer, _) = renderer_with_cube();
        let ray = Ray {
            origin: Vec3::new(10.0, 10.0, 10.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        assert!(CellPicker::default().pick(&ray, &renderer).is_none());
    }

    #[test]
    fn test_point_pick_world() {
        let (renderer, id) = renderer_with_cube();
        let hit = PointPicker::default()
            .pick_world(Vec3::new(1.05, 1.0, 1.0), &renderer)
            .unwrap();
        assert_eq!(hit.actor, id);
        assert_eq!(
            renderer.actor(id).unwrap().geometry.points[hit.point_id],
            Vec3::new(1.0, 1.0, 1.0)
        );
    }

    #[test]
    fn test_prop_pick_nearest_actor() {
        let mut renderer = Renderer::new();
        let near = renderer.add_actor(Actor::new(
            RenderGeometry::from_poly_mesh(&PolyMesh::cube(Vec3::new(0.0, 0.0, 5.0), 1.0)),
            DrawGroup::Regular,
        ));
        let _far = renderer.add_actor(Actor::new(
            RenderGeometry::from_poly_mesh(&PolyMesh::cube(Vec3::new(0.0, 0.0, -5.0), 1.0)),
            DrawGroup::Regular,
        ));
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 10.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        let (id, _) = PropPicker.pick(&ray, &renderer).unwrap();
        assert_eq!(id, near);
    }

    #[test]
    fn test_pick_state_sentinels() {
        let mut state = PickState::default();
        assert_eq!(state.picked_node_id(), "");
        assert_eq!(state.picked_cell_id(), -1);
        assert_eq!(state.picked_point_id(), -1);
        assert!(state.set(NodeId::new("ModelDisplay1"), Vec3::ONE, 3, 7));
        assert_eq!(state.picked_node_id(), "ModelDisplay1");
        assert!(state.reset());
        assert_eq!(state.picked_cell_id(), -1);
        assert!(!state.reset());
    }
}
