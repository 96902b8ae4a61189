//! Model displayable manager for 3D views
//!
//! Owns one actor per visible model display node, keyed by display node ID,
//! and keeps it synchronized through incremental two-half dirty checking:
//! the mesh half (payload stamp, transform chain, clip configuration)
//! rebuilds the actor geometry, while the display half (property bag)
//! only restyles the existing actor. Slice-plane proxy models land in the
//! proxy draw group so transparent regular geometry composites over them.

use std::collections::{HashMap, HashSet};

use glam::{Mat4, Vec3};
use log::debug;

use crate::broker::Subject;
use crate::dmml::{
    EventKind, Node, NodeId, NodeKind, Scene, SceneEvent,
};
use crate::dmml::display::ModelDisplayNode;
use crate::dmml::model::ModelNode;
use crate::dmml::view::SliceNode;
use crate::geometry::{
    clip_mesh, ClipMethod, ClipSide, Mesh, PolyMesh, SliceClipFunction, UnstructuredGrid,
};
use crate::picking::{CellPicker, PickState, PointPicker};
use crate::render::{Actor, ActorId, DrawGroup, RenderGeometry};

use super::manager::{DisplayableManager, ManagerContext, ManagerCore};

/// Snapshot of the scalar-coloring settings baked into actor geometry
///
/// Scalar colors live on the geometry (per-point), so a change here dirties
/// the mesh half even though it comes from the display node.
#[derive(Debug, Clone, PartialEq)]
struct ScalarStyle {
    enabled: bool,
    array: Option<String>,
    range: [f32; 2],
    below: Vec3,
    above: Vec3,
}

impl ScalarStyle {
    fn of(display: &ModelDisplayNode) -> Self {
        Self {
            enabled: display.scalar_visibility,
            array: display.active_scalar.clone(),
            range: display.scalar_range,
            below: display.ramp_below_color,
            above: display.ramp_above_color,
        }
    }
}

/// Book-keeping for one display node's actor
#[derive(Debug)]
struct ActorEntry {
    actor: ActorId,
    displayable: NodeId,
    slice_proxy: bool,
    /// Mesh-half stamps: geometry rebuilds when any of these drift
    mesh_mtime: u64,
    transform_epoch: u64,
    parent_transform: Option<NodeId>,
    clipping: bool,
    clip_stamp: u64,
    proxy_stamp: u64,
    scalar_style: ScalarStyle,
}

/// The composed clip configuration of the scene, with a change stamp
fn scene_clip_state(scene: &Scene) -> Option<(SliceClipFunction, ClipMethod, u64)> {
    let clip = scene.clip_node()?;
    let mut stamp = clip.base.mtime();
    let mut planes = Vec::new();
    for layout in ["Red", "Green", "Yellow"] {
        let Some(slice) = scene.slice_by_layout(layout) else {
            continue;
        };
        match clip.state_for_layout(layout) {
            ClipSide::Off => {}
            ClipSide::PositiveSpace => {
                stamp = stamp.max(slice.base.mtime());
                planes.push((slice.plane(), true));
            }
            ClipSide::NegativeSpace => {
                stamp = stamp.max(slice.base.mtime());
                planes.push((slice.plane(), false));
            }
        }
    }
    Some((
        SliceClipFunction {
            planes,
            combine: clip.combine,
        },
        clip.method,
        stamp,
    ))
}

/// Geometry of one display, baked into RAS when needed
///
/// Returns the renderable geometry and the actor pose. Linear transform
/// chains stay as a pose; clipping or a non-linear chain forces point-wise
/// baking (planes are defined in RAS, and a warp has no matrix form).
fn build_geometry(
    scene: &Scene,
    model: &ModelNode,
    display: &ModelDisplayNode,
    mesh: &Mesh,
    slice: Option<&SliceNode>,
    clip: Option<&(SliceClipFunction, ClipMethod, u64)>,
) -> (RenderGeometry, Mat4) {
    let world = scene.transform_to_world(&model.base.id);
    // Proxy payloads live in slice coordinates.
    let slice_pose = slice.map_or(Mat4::IDENTITY, |s| s.slice_to_ras);
    let clip_active = clip.is_some_and(|(f, _, _)| !f.is_empty());

    if !clip_active {
        if let Some(m) = world.as_linear() {
            return (
                styled_geometry(mesh.render_surface(), display),
                m * slice_pose,
            );
        }
    }

    let to_ras = |p: Vec3| world.apply_point(slice_pose.transform_point3(p));
    let baked = match mesh {
        Mesh::Surface(m) => Mesh::Surface(PolyMesh {
            points: m.points.iter().map(|&p| to_ras(p)).collect(),
            triangles: m.triangles.clone(),
            scalars: m.scalars.clone(),
        }),
        Mesh::Volume(g) => Mesh::Volume(UnstructuredGrid {
            points: g.points.iter().map(|&p| to_ras(p)).collect(),
            tetrahedra: g.tetrahedra.clone(),
        }),
    };
    let baked = match clip {
        Some((f, method, _)) if !f.is_empty() => clip_mesh(&baked, f, *method),
        _ => baked,
    };
    (
        styled_geometry(baked.render_surface(), display),
        Mat4::IDENTITY,
    )
}

/// Render geometry with per-point scalar colors applied when enabled
fn styled_geometry(surface: PolyMesh, display: &ModelDisplayNode) -> RenderGeometry {
    let mut geometry = RenderGeometry::from_poly_mesh(&surface);
    if display.scalar_visibility {
        let wanted = surface.scalars.as_ref().filter(|s| {
            display
                .active_scalar
                .as_ref()
                .map_or(true, |name| *name == s.name)
        });
        if let Some(scalars) = wanted {
            let [lo, hi] = display.scalar_range;
            let span = (hi - lo).max(f32::EPSILON);
            geometry.point_colors = Some(
                scalars
                    .values
                    .iter()
                    .map(|&v| {
                        let t = ((v - lo) / span).clamp(0.0, 1.0);
                        display.ramp_below_color.lerp(display.ramp_above_color, t)
                    })
                    .collect(),
            );
        }
    }
    geometry
}

/// Manager reflecting model display nodes into a 3D renderer
pub struct ModelDisplayableManager {
    core: ManagerCore,
    entries: HashMap<NodeId, ActorEntry>,
    pick_state: PickState,
}

impl ModelDisplayableManager {
    pub fn new(view_node: NodeId, observer: crate::broker::ObserverId) -> Self {
        Self {
            core: ManagerCore::new(view_node, observer),
            entries: HashMap::new(),
            pick_state: PickState::default(),
        }
    }

    /// Result of the last pick
    pub fn pick_state(&self) -> &PickState {
        &self.pick_state
    }

    /// Display node behind an actor, by reverse lookup through the entries
    pub fn display_for_actor(&self, actor: ActorId) -> Option<&NodeId> {
        self.entries
            .iter()
            .find(|(_, e)| e.actor == actor)
            .map(|(id, _)| id)
    }

    /// Picks the cell under a screen position; true if the state changed
    pub fn pick(&mut self, x: f32, y: f32, renderer: &crate::render::Renderer) -> bool {
        let changed = self.pick_state.reset();
        let ray = renderer.screen_ray(x, y);
        if let Some(hit) = CellPicker::default().pick(&ray, renderer) {
            if let Some(display_id) = self.display_for_actor(hit.actor).cloned() {
                return self
                    .pick_state
                    .set(display_id, hit.world, hit.cell_id, hit.point_id)
                    || changed;
            }
        }
        changed
    }

    /// Picks the nearest vertex to a RAS position; true if the state changed
    pub fn pick_3d(&mut self, ras: Vec3, renderer: &crate::render::Renderer) -> bool {
        let changed = self.pick_state.reset();
        if let Some(hit) = PointPicker::default().pick_world(ras, renderer) {
            if let Some(display_id) = self.display_for_actor(hit.actor).cloned() {
                return self
                    .pick_state
                    .set(display_id, hit.world, hit.cell_id, hit.point_id)
                    || changed;
            }
        }
        changed
    }

    fn destroy_entry(&mut self, display_id: &NodeId, ctx: &mut ManagerContext<'_>) {
        if let Some(entry) = self.entries.remove(display_id) {
            ctx.renderer.remove_actor(entry.actor);
            ctx.request_render();
        }
    }

    fn clear_entries(&mut self, ctx: &mut ManagerContext<'_>) {
        for (_, entry) in self.entries.drain() {
            ctx.renderer.remove_actor(entry.actor);
        }
        ctx.request_render();
    }

    /// Creates or refreshes the actor of one display node
    ///
    /// Geometry rebuilds only when the mesh half is dirty; display
    /// properties are restyled unconditionally (they are cheap).
    fn update_entry(&mut self, display_id: &NodeId, ctx: &mut ManagerContext<'_>) {
        let scene = &*ctx.scene;
        let Some(display) = scene.get(display_id).and_then(Node::as_display) else {
            self.destroy_entry(display_id, ctx);
            return;
        };
        if !display.applies_to_view(self.core.view_node()) {
            self.destroy_entry(display_id, ctx);
            return;
        }
        let model = display
            .displayable_id
            .as_ref()
            .and_then(|id| scene.get(id))
            .and_then(Node::as_model);
        let Some(model) = model else {
            self.destroy_entry(display_id, ctx);
            return;
        };
        let Some(mesh) = model.mesh() else {
            self.destroy_entry(display_id, ctx);
            return;
        };

        let clip_state = scene_clip_state(scene);
        let clip_stamp = if display.clipping {
            clip_state.as_ref().map_or(0, |(_, _, s)| *s)
        } else {
            0
        };
        let slice = model
            .slice_proxy_for
            .as_deref()
            .and_then(|layout| scene.slice_by_layout(layout));
        let proxy_stamp = slice.map_or(0, |s| s.base.mtime());
        let parent_transform = model.base.parent_transform.clone();
        let transform_epoch = scene.transform_epoch();
        let scalar_style = ScalarStyle::of(display);

        let mesh_dirty = match self.entries.get(display_id) {
            None => true,
            Some(e) => {
                e.mesh_mtime != model.mesh_mtime()
                    || e.clipping != display.clipping
                    || e.clip_stamp != clip_stamp
                    || e.proxy_stamp != proxy_stamp
                    || e.parent_transform != parent_transform
                    || (e.parent_transform.is_some() && e.transform_epoch != transform_epoch)
                    || e.scalar_style != scalar_style
            }
        };

        if mesh_dirty {
            let clip = clip_state.as_ref().filter(|_| display.clipping);
            let (geometry, pose) = build_geometry(scene, model, display, mesh, slice, clip);
            let group = if model.is_slice_proxy() {
                DrawGroup::SliceProxy
            } else {
                DrawGroup::Regular
            };
            let actor = match self.entries.get(display_id) {
                Some(e) => {
                    let a = ctx
                        .renderer
                        .actor_mut(e.actor)
                        .expect("entry actor missing from renderer");
                    a.geometry = geometry;
                    a.pose = pose;
                    e.actor
                }
                None => {
                    let mut actor = Actor::new(geometry, group);
                    actor.pose = pose;
                    ctx.renderer.add_actor(actor)
                }
            };
            self.entries.insert(
                display_id.clone(),
                ActorEntry {
                    actor,
                    displayable: model.base.id.clone(),
                    slice_proxy: model.is_slice_proxy(),
                    mesh_mtime: model.mesh_mtime(),
                    transform_epoch,
                    parent_transform,
                    clipping: display.clipping,
                    clip_stamp,
                    proxy_stamp,
                    scalar_style,
                },
            );
            ctx.request_render();
        }

        self.apply_display_properties(display_id, ctx);
    }

    /// Restyles the entry's actor from the display node and its hierarchy
    fn apply_display_properties(&mut self, display_id: &NodeId, ctx: &mut ManagerContext<'_>) {
        let Some(entry) = self.entries.get(display_id) else {
            return;
        };
        let scene = &*ctx.scene;
        let Some(display) = scene.get(display_id).and_then(Node::as_display) else {
            return;
        };
        let (folder_visible, folder_opacity) = scene.folder_composition(&entry.displayable);
        let proxy_visible = if entry.slice_proxy {
            scene
                .get(&entry.displayable)
                .and_then(Node::as_model)
                .and_then(|m| m.slice_proxy_for.as_deref())
                .and_then(|layout| scene.slice_by_layout(layout))
                .map_or(false, |s| s.visible_in_3d)
        } else {
            true
        };
        let visible =
            display.visibility && display.visibility_3d && folder_visible && proxy_visible;

        let Some(actor) = ctx.renderer.actor_mut(entry.actor) else {
            return;
        };
        actor.visible = visible;
        actor.color = display.color;
        actor.backface_color = Some(display.backface_color());
        actor.opacity = display.opacity * folder_opacity;
        actor.ambient = display.ambient;
        actor.diffuse = display.diffuse;
        actor.specular = display.specular;
        actor.specular_power = display.specular_power;
        ctx.request_render();
    }

    /// Refreshes every entry whose model is the given node
    fn update_entries_of_model(&mut self, model_id: &NodeId, ctx: &mut ManagerContext<'_>) {
        let displays: Vec<NodeId> = self
            .entries
            .iter()
            .filter(|(_, e)| &e.displayable == model_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in displays {
            self.update_entry(&id, ctx);
        }
    }

    fn update_all_entries(&mut self, ctx: &mut ManagerContext<'_>) {
        let displays: Vec<NodeId> = self.entries.keys().cloned().collect();
        for id in displays {
            self.update_entry(&id, ctx);
        }
    }
}

impl DisplayableManager for ModelDisplayableManager {
    fn name(&self) -> &'static str {
        "ModelDisplayableManager"
    }

    fn core(&self) -> &ManagerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ManagerCore {
        &mut self.core
    }

    fn create(&mut self, ctx: &mut ManagerContext<'_>) {
        let observer = self.core.observer();
        for kind in [
            EventKind::NodeAdded,
            EventKind::NodeRemoved,
            EventKind::NodeModified,
            EventKind::BatchProcessingEnded,
            EventKind::SceneClosing,
            EventKind::SceneClosed,
        ] {
            ctx.broker.add_observation(Subject::Scene, kind, observer);
        }
        self.core.mark_created();
        self.core.request_update_from_scene();
    }

    fn process_scene_event(&mut self, event: &SceneEvent, ctx: &mut ManagerContext<'_>) {
        match event {
            SceneEvent::NodeAdded(id) => {
                if self.core.is_closing() {
                    return;
                }
                let relevant = ctx.scene.get(id).map_or(false, |n| {
                    matches!(
                        n.kind(),
                        NodeKind::Model
                            | NodeKind::ModelDisplay
                            | NodeKind::Transform
                            | NodeKind::Folder
                            | NodeKind::Clip
                            | NodeKind::Slice
                    )
                });
                if relevant {
                    self.core.request_update_from_scene();
                }
            }
            SceneEvent::NodeRemoved { id, kind } => {
                if *kind == NodeKind::ModelDisplay {
                    // Eager destruction: the actor leaves the renderer now,
                    // not at the next rebuild.
                    self.destroy_entry(id, ctx);
                }
                if self.core.is_closing() {
                    return;
                }
                if matches!(
                    kind,
                    NodeKind::Model
                        | NodeKind::ModelDisplay
                        | NodeKind::Transform
                        | NodeKind::Folder
                        | NodeKind::Clip
                        | NodeKind::Slice
                ) {
                    self.core.request_update_from_scene();
                }
            }
            SceneEvent::NodeModified(id) => {
                if self.core.is_closing() {
                    return;
                }
                if self.entries.contains_key(id) {
                    self.update_entry(id, ctx);
                    return;
                }
                match ctx.scene.get(id).map(Node::kind) {
                    Some(NodeKind::Model) => self.update_entries_of_model(id, ctx),
                    Some(
                        NodeKind::Transform
                        | NodeKind::Folder
                        | NodeKind::Clip
                        | NodeKind::Slice,
                    ) => self.update_all_entries(ctx),
                    // A display without an entry may qualify after the change.
                    Some(NodeKind::ModelDisplay) => self.core.request_update_from_scene(),
                    _ => {}
                }
            }
            SceneEvent::BatchProcessingEnded => self.core.request_update_from_scene(),
            SceneEvent::SceneClosing => {
                self.core.set_closing(true);
                self.clear_entries(ctx);
            }
            SceneEvent::SceneClosed => {
                self.core.set_closing(false);
                self.entries.clear();
                self.pick_state.reset();
            }
            _ => {}
        }
    }

    fn update_from_scene(&mut self, ctx: &mut ManagerContext<'_>) {
        if self.core.is_closing() {
            return;
        }
        let view_id = self.core.view_node().clone();
        let mut qualifying: Vec<(NodeId, bool)> = Vec::new();
        for node in ctx.scene.nodes() {
            let Some(display) = node.as_display() else {
                continue;
            };
            if !display.applies_to_view(&view_id) {
                continue;
            }
            let model = display
                .displayable_id
                .as_ref()
                .and_then(|id| ctx.scene.get(id))
                .and_then(Node::as_model);
            let Some(model) = model else {
                continue;
            };
            if model.mesh().is_none() {
                continue;
            }
            qualifying.push((display.base.id.clone(), model.is_slice_proxy()));
        }

        // A slice proxy appearing invalidates the composition order of
        // everything already built, so start over.
        let new_proxy = qualifying
            .iter()
            .any(|(id, proxy)| *proxy && !self.entries.contains_key(id));
        if new_proxy && !self.entries.is_empty() {
            debug!("new slice proxy appeared, rebuilding all model actors");
            self.clear_entries(ctx);
        }

        let keep: HashSet<&NodeId> = qualifying.iter().map(|(id, _)| id).collect();
        let stale: Vec<NodeId> = self
            .entries
            .keys()
            .filter(|id| !keep.contains(id))
            .cloned()
            .collect();
        for id in stale {
            self.destroy_entry(&id, ctx);
        }

        for (display_id, _) in &qualifying {
            self.update_entry(display_id, ctx);
        }
        ctx.request_render();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::EventBroker;
    use crate::dmml::view::{ClipNode, ViewNode};
    use crate::dmml::TransformNode;
    use crate::dmml::transform::DisplacementField;
    use crate::dmml::view::FolderNode;
    use crate::geometry::ClipCombine;
    use crate::render::Renderer;

    struct Fixture {
        scene: Scene,
        broker: EventBroker,
        renderer: Renderer,
        manager: ModelDisplayableManager,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        let view = scene.add_node(Node::View(ViewNode::new("View1")));
        let mut broker = EventBroker::new();
        let observer = broker.register_observer();
        Fixture {
            scene,
            broker,
            renderer: Renderer::new(),
            manager: ModelDisplayableManager::new(view, observer),
        }
    }

    fn update(f: &mut Fixture) {
        let mut render_requested = false;
        let mut ctx = ManagerContext::new(
            &mut f.scene,
            &mut f.broker,
            &mut f.renderer,
            &mut render_requested,
        );
        f.manager.update_from_scene(&mut ctx);
    }

    fn add_cube(f: &mut Fixture, half: f32) -> (NodeId, NodeId) {
        f.scene.add_model_with_display(
            ModelNode::with_mesh("cube", Mesh::Surface(PolyMesh::cube(Vec3::ZERO, half))),
            ModelDisplayNode::new("cube display"),
        )
    }

    #[test]
    fn test_one_actor_per_visible_display() {
        let mut f = fixture();
        add_cube(&mut f, 1.0);
        update(&mut f);
        assert_eq!(f.renderer.actor_count(), 1);
        // A second pass does not duplicate actors.
        update(&mut f);
        assert_eq!(f.renderer.actor_count(), 1);
    }

    #[test]
    fn test_remove_and_readd_keeps_single_actor() {
        let mut f = fixture();
        let (_, display_id) = add_cube(&mut f, 1.0);
        update(&mut f);
        f.scene.remove_node(&display_id);
        update(&mut f);
        assert_eq!(f.renderer.actor_count(), 0);
        add_cube(&mut f, 1.0);
        update(&mut f);
        assert_eq!(f.renderer.actor_count(), 1);
    }

    #[test]
    fn test_hidden_display_keeps_invisible_actor() {
        let mut f = fixture();
        let (_, display_id) = add_cube(&mut f, 1.0);
        update(&mut f);
        f.scene.modify(&display_id, |n| {
            if let Some(d) = n.as_display_mut() {
                d.visibility = false;
            }
        });
        update(&mut f);
        let (_, actor) = f.renderer.actors().next().unwrap();
        assert!(!actor.visible);
    }

    #[test]
    fn test_view_restriction_change_removes_actor() {
        let mut f = fixture();
        let (_, display_id) = add_cube(&mut f, 1.0);
        update(&mut f);
        assert_eq!(f.renderer.actor_count(), 1);

        // Restricting the display to another view must tear the actor down
        // on the incremental path, without a full rebuild.
        f.scene.modify(&display_id, |n| {
            if let Some(d) = n.as_display_mut() {
                d.view_node_ids.push(NodeId::new("SomeOtherView"));
            }
        });
        let mut render_requested = false;
        let mut ctx = ManagerContext::new(
            &mut f.scene,
            &mut f.broker,
            &mut f.renderer,
            &mut render_requested,
        );
        f.manager
            .process_scene_event(&SceneEvent::NodeModified(display_id), &mut ctx);
        assert_eq!(f.renderer.actor_count(), 0);
    }

    #[test]
    fn test_negative_space_clip_bounds_geometry() {
        let mut f = fixture();
        let (_, display_id) = add_cube(&mut f, 10.0);
        f.scene.modify(&display_id, |n| {
            if let Some(d) = n.as_display_mut() {
                d.clipping = true;
            }
        });
        f.scene.add_node(Node::Slice(SliceNode::axial("Red")));
        let mut clip = ClipNode::new();
        clip.combine = ClipCombine::Intersection;
        clip.red_state = ClipSide::NegativeSpace;
        f.scene.add_node(Node::Clip(clip));
        update(&mut f);

        let (_, actor) = f.renderer.actors().next().unwrap();
        assert!(!actor.geometry.points.is_empty());
        for p in &actor.geometry.points {
            assert!(p.z <= 1e-4, "point above the kept half-space: {p:?}");
        }
    }

    #[test]
    fn test_folder_composition_applies_to_actor() {
        let mut f = fixture();
        let (model_id, display_id) = add_cube(&mut f, 1.0);
        let mut folder = FolderNode::new("group");
        folder.opacity = 0.5;
        let folder_id = f.scene.add_node(Node::Folder(folder));
        f.scene.modify(&model_id, |n| {
            n.base_mut().parent_folder = Some(folder_id.clone());
        });
        f.scene.modify(&display_id, |n| {
            if let Some(d) = n.as_display_mut() {
                d.opacity = 0.5;
            }
        });
        update(&mut f);
        let (_, actor) = f.renderer.actors().next().unwrap();
        assert!((actor.opacity - 0.25).abs() < 1e-6);

        f.scene.modify(&folder_id, |n| {
            if let Some(folder) = n.as_folder_mut() {
                folder.visibility = false;
            }
        });
        update(&mut f);
        let (_, actor) = f.renderer.actors().next().unwrap();
        assert!(!actor.visible);
    }

    #[test]
    fn test_slice_proxy_draws_before_regular_models() {
        let mut f = fixture();
        let mut slice = SliceNode::axial("Red");
        slice.visible_in_3d = true;
        f.scene.add_node(Node::Slice(slice));
        let mut proxy = ModelNode::with_mesh(
            "red proxy",
            Mesh::Surface(PolyMesh::plane_quad(
                Vec3::ZERO,
                Vec3::X * 100.0,
                Vec3::Y * 100.0,
            )),
        );
        proxy.slice_proxy_for = Some("Red".to_string());
        let (_, proxy_display) = f
            .scene
            .add_model_with_display(proxy, ModelDisplayNode::new("red proxy display"));
        let (_, cube_display) = add_cube(&mut f, 1.0);
        update(&mut f);

        let order = f.renderer.draw_order();
        assert_eq!(order.len(), 2);
        let first = f.manager.display_for_actor(order[0]).unwrap();
        let second = f.manager.display_for_actor(order[1]).unwrap();
        assert_eq!(first, &proxy_display);
        assert_eq!(second, &cube_display);
    }

    #[test]
    fn test_mesh_change_regenerates_geometry() {
        let mut f = fixture();
        let (model_id, _) = add_cube(&mut f, 1.0);
        update(&mut f);
        f.scene.modify(&model_id, |n| {
            if let Some(m) = n.as_model_mut() {
                m.set_mesh(Some(Mesh::Surface(PolyMesh::cube(Vec3::ZERO, 2.0))));
            }
        });
        update(&mut f);
        let (_, actor) = f.renderer.actors().next().unwrap();
        let bounds = actor.geometry.bounds().unwrap();
        assert_eq!(bounds.max, Vec3::splat(2.0));
    }

    #[test]
    fn test_nonlinear_transform_bakes_points() {
        let mut f = fixture();
        let (model_id, _) = add_cube(&mut f, 1.0);
        let field = DisplacementField {
            origin: Vec3::ZERO,
            spacing: Vec3::ONE,
            dims: [1, 1, 1],
            vectors: vec![Vec3::new(0.0, 0.0, 5.0)],
        };
        let warp = f
            .scene
            .add_node(Node::Transform(TransformNode::displacement("warp", field)));
        f.scene.modify(&model_id, |n| {
            n.base_mut().parent_transform = Some(warp.clone());
        });
        update(&mut f);
        let (_, actor) = f.renderer.actors().next().unwrap();
        assert_eq!(actor.pose, Mat4::IDENTITY);
        let bounds = actor.geometry.bounds().unwrap();
        assert!((bounds.min.z - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_pick_resolves_display_node() {
        let mut f = fixture();
        let (_, display_id) = add_cube(&mut f, 1.0);
        update(&mut f);
        // Camera at default (0, 500, 0) looking at the origin: the view
        // center pixel rays through the cube.
        let changed = f.manager.pick(256.0, 256.0, &f.renderer);
        assert!(changed);
        assert_eq!(f.manager.pick_state().picked_node_id(), display_id.as_str());
        assert!(f.manager.pick_state().picked_cell_id() >= 0);

        // Picking empty space resets to the sentinels.
        let changed = f.manager.pick(0.0, 0.0, &f.renderer);
        assert!(changed);
        assert_eq!(f.manager.pick_state().picked_node_id(), "");
        assert_eq!(f.manager.pick_state().picked_cell_id(), -1);
    }

    #[test]
    fn test_pick_3d_resolves_nearest_vertex() {
        let mut f = fixture();
        let (_, display_id) = add_cube(&mut f, 1.0);
        update(&mut f);
        assert!(f.manager.pick_3d(Vec3::new(1.1, 1.0, 1.0), &f.renderer));
        assert_eq!(f.manager.pick_state().picked_node_id(), display_id.as_str());
    }
}
