//! Model displayable manager for 2D slice views
//!
//! Reflects model display nodes into a slice renderer as the model's
//! footprint on the slice plane. Three modes exist per display node:
//! the true intersection contour, the whole geometry flattened onto the
//! plane, and the flattened geometry colored by signed plane distance.
//!
//! The pipeline is staged: the world-space (RAS) surface is cached per
//! entry, so a slice-pose change or a display-mode switch only re-runs the
//! cut/projection stage, not the transform bake.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::broker::Subject;
use crate::dmml::display::SliceDisplayMode;
use crate::dmml::view::SliceNode;
use crate::dmml::{EventKind, Node, NodeId, NodeKind, Scene, SceneEvent};
use crate::geometry::{
    cut_with_plane, distance_encoded_colors, flatten_to_slice, signed_distances, PolyMesh,
};
use crate::render::{Actor, ActorId, DrawGroup, RenderGeometry};

use super::manager::{DisplayableManager, ManagerContext, ManagerCore};

/// Book-keeping for one display node's slice-view actor
#[derive(Debug)]
struct SliceEntry {
    actor: ActorId,
    displayable: NodeId,
    /// Model surface baked into RAS, cached across projection re-runs
    world_surface: PolyMesh,
    mesh_mtime: u64,
    transform_epoch: u64,
    parent_transform: Option<NodeId>,
    /// Stamp of the slice pose the projection was computed against
    slice_mtime: u64,
    /// Stamp of the display node the projection was computed against
    display_mtime: u64,
}

/// Manager reflecting model display nodes into a 2D slice renderer
pub struct ModelSliceDisplayableManager {
    core: ManagerCore,
    entries: HashMap<NodeId, SliceEntry>,
}

impl ModelSliceDisplayableManager {
    /// Binds to the slice node of the 2D view this manager serves
    pub fn new(slice_node: NodeId, observer: crate::broker::ObserverId) -> Self {
        Self {
            core: ManagerCore::new(slice_node, observer),
            entries: HashMap::new(),
        }
    }

    /// Display node behind an actor, by reverse lookup through the entries
    pub fn display_for_actor(&self, actor: ActorId) -> Option<&NodeId> {
        self.entries
            .iter()
            .find(|(_, e)| e.actor == actor)
            .map(|(id, _)| id)
    }

    fn slice_node<'s>(&self, scene: &'s Scene) -> Option<&'s SliceNode> {
        scene.get(self.core.view_node()).and_then(Node::as_slice)
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

    fn update_entry(&mut self, display_id: &NodeId, ctx: &mut ManagerContext<'_>) {
        let scene = &*ctx.scene;
        let Some(display) = scene.get(display_id).and_then(Node::as_display) else {
            self.destroy_entry(display_id, ctx);
            return;
        };
        let display = display.clone();
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
        let Some(slice) = self.slice_node(scene) else {
            self.destroy_entry(display_id, ctx);
            return;
        };

        let model_id = model.base.id.clone();
        let parent_transform = model.base.parent_transform.clone();
        let transform_epoch = scene.transform_epoch();
        let mesh_mtime = model.mesh_mtime();
        let slice_mtime = slice.base.mtime();
        let display_mtime = display.base.mtime();

        let bake_dirty = match self.entries.get(display_id) {
            None => true,
            Some(e) => {
                e.mesh_mtime != mesh_mtime
                    || e.parent_transform != parent_transform
                    || (e.parent_transform.is_some() && e.transform_epoch != transform_epoch)
            }
        };
        let project_dirty = bake_dirty
            || self.entries.get(display_id).map_or(true, |e| {
                e.slice_mtime != slice_mtime || e.display_mtime != display_mtime
            });

        let world_surface = if bake_dirty {
            let world = scene.transform_to_world(&model_id);
            let surface = mesh.render_surface();
            PolyMesh {
                points: surface.points.iter().map(|&p| world.apply_point(p)).collect(),
                triangles: surface.triangles,
                scalars: surface.scalars,
            }
        } else {
            // Reuse the cached bake; only the cut/projection stage re-runs.
            self.entries
                .get(display_id)
                .map(|e| e.world_surface.clone())
                .unwrap_or_default()
        };

        let slice = slice.clone();
        let (folder_visible, folder_opacity) = scene.folder_composition(&model_id);

        if project_dirty {
            let (geometry, has_footprint) = project_surface(&world_surface, &slice, &display);
            if !has_footprint {
                debug!(
                    "display {display_id} has no footprint on slice {}",
                    slice.layout_name
                );
            }
            let actor = match self.entries.get(display_id) {
                Some(e) => {
                    let a = ctx
                        .renderer
                        .actor_mut(e.actor)
                        .expect("entry actor missing from renderer");
                    a.geometry = geometry;
                    e.actor
                }
                None => ctx
                    .renderer
                    .add_actor(Actor::new(geometry, DrawGroup::Regular)),
            };
            self.entries.insert(
                display_id.clone(),
                SliceEntry {
                    actor,
                    displayable: model_id.clone(),
                    world_surface,
                    mesh_mtime,
                    transform_epoch,
                    parent_transform,
                    slice_mtime,
                    display_mtime,
                },
            );
            ctx.request_render();
        }

        let Some(entry) = self.entries.get(display_id) else {
            return;
        };
        let Some(actor) = ctx.renderer.actor_mut(entry.actor) else {
            return;
        };
        actor.visible = display.visibility
            && display.visibility_2d
            && folder_visible
            && !actor.geometry.is_empty();
        actor.color = display.color;
        actor.opacity = display.opacity * folder_opacity;
        actor.line_width = display.slice_intersection_thickness;
        ctx.request_render();
    }

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

/// Runs the cut/projection stage for one display
///
/// Returns the geometry and whether the model actually has a footprint on
/// the slice (an intersection mode with no plane crossing has none).
fn project_surface(
    world_surface: &PolyMesh,
    slice: &SliceNode,
    display: &crate::dmml::display::ModelDisplayNode,
) -> (RenderGeometry, bool) {
    let ras_to_slice = slice.slice_to_ras.inverse();
    let plane = slice.plane();
    match display.slice_display_mode {
        SliceDisplayMode::Intersection => {
            let cut = cut_with_plane(world_surface, &plane);
            if cut.is_empty() {
                return (RenderGeometry::default(), false);
            }
            let geometry = RenderGeometry {
                points: flatten_to_slice(&cut.points, &ras_to_slice),
                triangles: Vec::new(),
                lines: cut.segments,
                point_colors: None,
            };
            (geometry, true)
        }
        SliceDisplayMode::Projection => {
            let geometry = RenderGeometry {
                points: flatten_to_slice(&world_surface.points, &ras_to_slice),
                triangles: world_surface.triangles.clone(),
                lines: Vec::new(),
                point_colors: None,
            };
            let has_footprint = !geometry.is_empty();
            (geometry, has_footprint)
        }
        SliceDisplayMode::DistanceEncodedProjection => {
            let distances = signed_distances(&world_surface.points, &plane);
            let colors = distance_encoded_colors(
                &distances,
                display.distance_range,
                display.ramp_below_color,
                display.ramp_above_color,
            );
            let geometry = RenderGeometry {
                points: flatten_to_slice(&world_surface.points, &ras_to_slice),
                triangles: world_surface.triangles.clone(),
                lines: Vec::new(),
                point_colors: Some(colors),
            };
            let has_footprint = !geometry.is_empty();
            (geometry, has_footprint)
        }
    }
}

impl DisplayableManager for ModelSliceDisplayableManager {
    fn name(&self) -> &'static str {
        "ModelSliceDisplayableManager"
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
                    )
                });
                if relevant {
                    self.core.request_update_from_scene();
                }
            }
            SceneEvent::NodeRemoved { id, kind } => {
                if *kind == NodeKind::ModelDisplay {
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
                ) {
                    self.core.request_update_from_scene();
                }
            }
            SceneEvent::NodeModified(id) => {
                if self.core.is_closing() {
                    return;
                }
                if id == self.core.view_node() {
                    // The slice plane moved: every footprint is stale.
                    self.update_all_entries(ctx);
                    return;
                }
                if self.entries.contains_key(id) {
                    self.update_entry(id, ctx);
                    return;
                }
                match ctx.scene.get(id).map(Node::kind) {
                    Some(NodeKind::Model) => self.update_entries_of_model(id, ctx),
                    Some(NodeKind::Transform | NodeKind::Folder) => {
                        self.update_all_entries(ctx)
                    }
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
            }
            _ => {}
        }
    }

    fn update_from_scene(&mut self, ctx: &mut ManagerContext<'_>) {
        if self.core.is_closing() {
            return;
        }
        let slice_id = self.core.view_node().clone();
        let mut qualifying: Vec<NodeId> = Vec::new();
        for node in ctx.scene.nodes() {
            let Some(display) = node.as_display() else {
                continue;
            };
            if !display.applies_to_view(&slice_id) {
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
            // Slice proxies are 3D-only furniture; they never project onto
            // a slice view.
            if model.mesh().is_none() || model.is_slice_proxy() {
                continue;
            }
            qualifying.push(display.base.id.clone());
        }

        let keep: HashSet<&NodeId> = qualifying.iter().collect();
        let stale: Vec<NodeId> = self
            .entries
            .keys()
            .filter(|id| !keep.contains(id))
            .cloned()
            .collect();
        for id in stale {
            self.destroy_entry(&id, ctx);
        }

        for display_id in &qualifying {
            self.update_entry(display_id, ctx);
        }
        ctx.request_render();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::EventBroker;
    use crate::dmml::display::ModelDisplayNode;
    use crate::dmml::model::ModelNode;
    use crate::geometry::{ramp_midpoint, Mesh};
    use crate::render::Renderer;
    use glam::{Mat4, Vec3};

    struct Fixture {
        scene: Scene,
        broker: EventBroker,
        renderer: Renderer,
        manager: ModelSliceDisplayableManager,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        let slice = scene.add_node(Node::Slice(SliceNode::axial("Red")));
        let mut broker = EventBroker::new();
        let observer = broker.register_observer();
        Fixture {
            scene,
            broker,
            renderer: Renderer::new(),
            manager: ModelSliceDisplayableManager::new(slice, observer),
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
    fn test_intersection_mode_produces_contour_lines() {
        let mut f = fixture();
        let (_, display_id) = add_cube(&mut f, 10.0);
        f.scene.modify(&display_id, |n| {
            if let Some(d) = n.as_display_mut() {
                d.slice_intersection_thickness = 3.0;
            }
        });
        update(&mut f);
        let (_, actor) = f.renderer.actors().next().unwrap();
        assert!(actor.visible);
        assert!(actor.geometry.triangles.is_empty());
        assert_eq!(actor.geometry.lines.len(), 8);
        assert_eq!(actor.line_width, 3.0);
        // Contour points live in the slice plane's 2D frame.
        for p in &actor.geometry.points {
            assert!(p.z.abs() < 1e-5);
        }
    }

    #[test]
    fn test_missed_slice_hides_actor() {
        let mut f = fixture();
        add_cube(&mut f, 1.0);
        let slice_id = f.manager.core().view_node().clone();
        f.scene.modify(&slice_id, |n| {
            if let Some(s) = n.as_slice_mut() {
                s.slice_to_ras = Mat4::from_translation(Vec3::new(0.0, 0.0, 50.0));
            }
        });
        update(&mut f);
        let (_, actor) = f.renderer.actors().next().unwrap();
        assert!(!actor.visible);
    }

    #[test]
    fn test_projection_mode_flattens_triangles() {
        let mut f = fixture();
        let (_, display_id) = add_cube(&mut f, 10.0);
        f.scene.modify(&display_id, |n| {
            if let Some(d) = n.as_display_mut() {
                d.slice_display_mode = SliceDisplayMode::Projection;
            }
        });
        update(&mut f);
        let (_, actor) = f.renderer.actors().next().unwrap();
        assert_eq!(actor.geometry.triangles.len(), 12);
        for p in &actor.geometry.points {
            assert!(p.z.abs() < 1e-5);
        }
    }

    #[test]
    fn test_distance_encoding_crossing_is_ramp_midpoint() {
        let mut f = fixture();
        // One triangle spanning the plane, with a vertex exactly on it.
        let mesh = PolyMesh {
            points: vec![
                Vec3::new(0.0, 0.0, -10.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 10.0),
            ],
            triangles: vec![[0, 1, 2]],
            scalars: None,
        };
        let (_, display_id) = f.scene.add_model_with_display(
            ModelNode::with_mesh("tri", Mesh::Surface(mesh)),
            ModelDisplayNode::new("tri display"),
        );
        f.scene.modify(&display_id, |n| {
            if let Some(d) = n.as_display_mut() {
                d.slice_display_mode = SliceDisplayMode::DistanceEncodedProjection;
                d.distance_range = 10.0;
            }
        });
        update(&mut f);
        let (_, actor) = f.renderer.actors().next().unwrap();
        let colors = actor.geometry.point_colors.as_ref().unwrap();
        let display = f.scene.get(&display_id).unwrap().as_display().unwrap();
        assert_eq!(colors[0], display.ramp_below_color);
        assert_eq!(
            colors[1],
            ramp_midpoint(display.ramp_below_color, display.ramp_above_color)
        );
        assert_eq!(colors[2], display.ramp_above_color);
    }

    #[test]
    fn test_mode_switch_swaps_contour_for_surface() {
        let mut f = fixture();
        let (_, display_id) = add_cube(&mut f, 10.0);
        update(&mut f);
        let (_, actor) = f.renderer.actors().next().unwrap();
        assert!(!actor.geometry.lines.is_empty());

        f.scene.modify(&display_id, |n| {
            if let Some(d) = n.as_display_mut() {
                d.slice_display_mode = SliceDisplayMode::Projection;
            }
        });
        update(&mut f);
        let (_, actor) = f.renderer.actors().next().unwrap();
        assert!(actor.geometry.lines.is_empty());
        assert!(!actor.geometry.triangles.is_empty());
    }

    #[test]
    fn test_visibility_2d_gates_actor() {
        let mut f = fixture();
        let (_, display_id) = add_cube(&mut f, 10.0);
        f.scene.modify(&display_id, |n| {
            if let Some(d) = n.as_display_mut() {
                d.visibility_2d = false;
            }
        });
        update(&mut f);
        let (_, actor) = f.renderer.actors().next().unwrap();
        assert!(!actor.visible);
    }

    #[test]
    fn test_view_restriction_change_removes_actor() {
        let mut f = fixture();
        let (_, display_id) = add_cube(&mut f, 10.0);
        update(&mut f);
        assert_eq!(f.renderer.actor_count(), 1);

        f.scene.modify(&display_id, |n| {
            if let Some(d) = n.as_display_mut() {
                d.view_node_ids.push(NodeId::new("SomeOtherSlice"));
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
    fn test_slice_proxy_models_are_excluded() {
        let mut f = fixture();
        let mut proxy = ModelNode::with_mesh(
            "proxy",
            Mesh::Surface(PolyMesh::cube(Vec3::ZERO, 10.0)),
        );
        proxy.slice_proxy_for = Some("Red".to_string());
        f.scene
            .add_model_with_display(proxy, ModelDisplayNode::new("proxy display"));
        update(&mut f);
        assert_eq!(f.renderer.actor_count(), 0);
    }
}
