//! View displayable manager: 3D-view furniture and view-node sync
//!
//! Draws the scene bounding box and the six anatomical axis labels
//! (R/L/A/P/S/I) as furniture actors, and mirrors the view node's
//! background and stereo settings into the renderer. Labels on axes that
//! point away from the camera are hidden, which requires re-evaluating on
//! every active-camera change and camera move.

use glam::Vec3;

use crate::broker::Subject;
use crate::dmml::{EventKind, Node, NodeId, NodeKind, Scene, SceneEvent};
use crate::geometry::Bounds;
use crate::render::{Actor, ActorId, DrawGroup, RenderGeometry};

use super::manager::{DisplayableManager, ManagerContext, ManagerCore};

/// Labels hide once their axis points this far away from the camera
const LABEL_HIDE_DOT: f32 = 0.9;

/// Degenerate box axes are padded by this fraction of the longest axis
const DEGENERATE_PAD_FRACTION: f32 = 0.05;

/// The six anatomical directions and their labels
const AXIS_LABELS: [(&str, Vec3); 6] = [
    ("R", Vec3::X),
    ("L", Vec3::new(-1.0, 0.0, 0.0)),
    ("A", Vec3::Y),
    ("P", Vec3::new(0.0, -1.0, 0.0)),
    ("S", Vec3::Z),
    ("I", Vec3::new(0.0, 0.0, -1.0)),
];

/// Manager for per-3D-view furniture: bounding box, axis labels, background
pub struct ViewDisplayableManager {
    core: ManagerCore,
    box_actor: Option<ActorId>,
    /// Label actors with the world direction they annotate
    label_actors: Vec<(ActorId, Vec3)>,
    observed_camera: Option<NodeId>,
    has_bounds: bool,
}

impl ViewDisplayableManager {
    pub fn new(view_node: NodeId, observer: crate::broker::ObserverId) -> Self {
        Self {
            core: ManagerCore::new(view_node, observer),
            box_actor: None,
            label_actors: Vec::new(),
            observed_camera: None,
            has_bounds: false,
        }
    }

    /// World bounds of everything visible in this view, or None when empty
    fn scene_bounds(&self, scene: &Scene) -> Option<Bounds> {
        let view_id = self.core.view_node();
        let mut total: Option<Bounds> = None;
        for node in scene.nodes() {
            let Some(display) = node.as_display() else {
                continue;
            };
            if !display.visibility || !display.visibility_3d || !display.applies_to_view(view_id)
            {
                continue;
            }
            let model = display
                .displayable_id
                .as_ref()
                .and_then(|id| scene.get(id))
                .and_then(Node::as_model);
            let Some(model) = model else {
                continue;
            };
            if model.is_slice_proxy() {
                continue;
            }
            let Some(local) = model.mesh().and_then(|m| m.bounds()) else {
                continue;
            };
            let (folder_visible, _) = scene.folder_composition(&model.base.id);
            if !folder_visible {
                continue;
            }
            let world = scene.transform_to_world(&model.base.id);
            let mut bounds: Option<Bounds> = None;
            for corner in local.corners() {
                let p = world.apply_point(corner);
                match &mut bounds {
                    None => bounds = Some(Bounds { min: p, max: p }),
                    Some(b) => b.expand(p),
                }
            }
            if let Some(b) = bounds {
                match &mut total {
                    None => total = Some(b),
                    Some(t) => t.union(&b),
                }
            }
        }
        total
    }

    fn sync_view_settings(&self, ctx: &mut ManagerContext<'_>) {
        let Some(view) = ctx.scene.get(self.core.view_node()).and_then(Node::as_view) else {
            return;
        };
        ctx.renderer.background_color = view.background_color;
        ctx.renderer.background_color2 = view.background_color2;
        ctx.renderer.stereo_type = view.stereo_type;
        ctx.request_render();
    }

    /// Hides labels whose direction points away from the camera
    fn update_label_visibility(&self, ctx: &mut ManagerContext<'_>) {
        let labels_on = ctx
            .scene
            .get(self.core.view_node())
            .and_then(Node::as_view)
            .map_or(false, |v| v.axis_labels_visible);
        let view_direction = ctx.renderer.camera.view_direction();
        for (actor_id, direction) in &self.label_actors {
            if let Some(actor) = ctx.renderer.actor_mut(*actor_id) {
                actor.visible = labels_on
                    && self.has_bounds
                    && direction.dot(view_direction) < LABEL_HIDE_DOT;
            }
        }
        ctx.request_render();
    }

    fn rebuild_furniture(&mut self, ctx: &mut ManagerContext<'_>) {
        let bounds = self.scene_bounds(ctx.scene).map(padded);
        self.has_bounds = bounds.is_some();
        let box_on = ctx
            .scene
            .get(self.core.view_node())
            .and_then(Node::as_view)
            .map_or(false, |v| v.box_visible);

        let bounds = bounds.unwrap_or(Bounds {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        });
        let box_geometry = box_edges(&bounds);
        match self.box_actor {
            Some(id) => {
                if let Some(actor) = ctx.renderer.actor_mut(id) {
                    actor.geometry = box_geometry;
                    actor.visible = box_on && self.has_bounds;
                }
            }
            None => {
                let mut actor = Actor::new(box_geometry, DrawGroup::Furniture);
                actor.pickable = false;
                actor.visible = box_on && self.has_bounds;
                actor.color = Vec3::ONE;
                self.box_actor = Some(ctx.renderer.add_actor(actor));
            }
        }

        let center = (bounds.min + bounds.max) * 0.5;
        let half = (bounds.max - bounds.min) * 0.5;
        if self.label_actors.is_empty() {
            for (text, direction) in AXIS_LABELS {
                let mut actor = Actor::new(RenderGeometry::default(), DrawGroup::Furniture);
                actor.pickable = false;
                actor.label = Some(text.to_string());
                let id = ctx.renderer.add_actor(actor);
                self.label_actors.push((id, direction));
            }
        }
        for (actor_id, direction) in &self.label_actors {
            if let Some(actor) = ctx.renderer.actor_mut(*actor_id) {
                // Just outside the box face the axis exits through.
                let offset = direction * (half * direction.abs()).length() * 1.1;
                actor.geometry = RenderGeometry {
                    points: vec![center + offset],
                    ..RenderGeometry::default()
                };
            }
        }
        self.update_label_visibility(ctx);
        ctx.request_render();
    }

    fn observe_camera(&mut self, camera: &NodeId, ctx: &mut ManagerContext<'_>) {
        if self.observed_camera.as_ref() == Some(camera) {
            return;
        }
        if let Some(old) = self.observed_camera.take() {
            ctx.broker.remove_observations(
                self.core.observer(),
                Some(&Subject::Node(old)),
                Some(EventKind::NodeModified),
            );
        }
        ctx.broker.add_observation(
            Subject::Node(camera.clone()),
            EventKind::NodeModified,
            self.core.observer(),
        );
        self.observed_camera = Some(camera.clone());
    }
}

/// Pads zero-thickness axes so flat scenes still get a visible box
fn padded(bounds: Bounds) -> Bounds {
    let extent = bounds.max - bounds.min;
    let longest = extent.max_element();
    let pad = if longest > 0.0 {
        DEGENERATE_PAD_FRACTION * longest
    } else {
        0.5
    };
    let mut min = bounds.min;
    let mut max = bounds.max;
    for axis in 0..3 {
        if extent[axis] < 1e-6 {
            min[axis] -= pad;
            max[axis] += pad;
        }
    }
    Bounds { min, max }
}

/// The 12 edges of a bounding box as line geometry
fn box_edges(bounds: &Bounds) -> RenderGeometry {
    // Corner index bits: 0 = x, 1 = y, 2 = z.
    let lines = vec![
        [0, 1], [2, 3], [4, 5], [6, 7],
        [0, 2], [1, 3], [4, 6], [5, 7],
        [0, 4], [1, 5], [2, 6], [3, 7],
    ];
    RenderGeometry {
        points: bounds.corners().to_vec(),
        triangles: Vec::new(),
        lines,
        point_colors: None,
    }
}

impl DisplayableManager for ViewDisplayableManager {
    fn name(&self) -> &'static str {
        "ViewDisplayableManager"
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
            EventKind::ActiveCameraChanged,
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
            SceneEvent::NodeAdded(id) | SceneEvent::NodeRemoved { id, .. } => {
                if self.core.is_closing() {
                    return;
                }
                let structural = match event {
                    SceneEvent::NodeRemoved { kind, .. } => matches!(
                        kind,
                        NodeKind::Model
                            | NodeKind::ModelDisplay
                            | NodeKind::Transform
                            | NodeKind::Folder
                    ),
                    _ => ctx.scene.get(id).map_or(false, |n| {
                        matches!(
                            n.kind(),
                            NodeKind::Model
                                | NodeKind::ModelDisplay
                                | NodeKind::Transform
                                | NodeKind::Folder
                        )
                    }),
                };
                if structural {
                    self.core.request_update_from_scene();
                }
            }
            SceneEvent::NodeModified(id) => {
                if self.core.is_closing() {
                    return;
                }
                if id == self.core.view_node() {
                    self.sync_view_settings(ctx);
                    self.update_label_visibility(ctx);
                    return;
                }
                if self.observed_camera.as_ref() == Some(id) {
                    self.update_label_visibility(ctx);
                    return;
                }
                match ctx.scene.get(id).map(Node::kind) {
                    Some(
                        NodeKind::Model
                        | NodeKind::ModelDisplay
                        | NodeKind::Transform
                        | NodeKind::Folder,
                    ) => self.core.request_update_from_scene(),
                    _ => {}
                }
            }
            SceneEvent::ActiveCameraChanged { view, camera } => {
                if view == self.core.view_node() {
                    self.observe_camera(camera, ctx);
                    self.update_label_visibility(ctx);
                }
            }
            SceneEvent::BatchProcessingEnded => self.core.request_update_from_scene(),
            SceneEvent::SceneClosing => self.core.set_closing(true),
            SceneEvent::SceneClosed => {
                self.core.set_closing(false);
                for (id, _) in self.label_actors.drain(..) {
                    ctx.renderer.remove_actor(id);
                }
                if let Some(id) = self.box_actor.take() {
                    ctx.renderer.remove_actor(id);
                }
                self.observed_camera = None;
                self.has_bounds = false;
            }
            _ => {}
        }
    }

    fn update_from_scene(&mut self, ctx: &mut ManagerContext<'_>) {
        if self.core.is_closing() {
            return;
        }
        self.sync_view_settings(ctx);
        self.rebuild_furniture(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::EventBroker;
    use crate::dmml::display::ModelDisplayNode;
    use crate::dmml::model::ModelNode;
    use crate::dmml::view::ViewNode;
    use crate::geometry::{Mesh, PolyMesh};
    use crate::render::Renderer;

    struct Fixture {
        scene: Scene,
        broker: EventBroker,
        renderer: Renderer,
        manager: ViewDisplayableManager,
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
            manager: ViewDisplayableManager::new(view, observer),
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

    fn add_cube(f: &mut Fixture, half: f32) {
        f.scene.add_model_with_display(
            ModelNode::with_mesh("cube", Mesh::Surface(PolyMesh::cube(Vec3::ZERO, half))),
            ModelDisplayNode::new("cube display"),
        );
    }

    #[test]
    fn test_box_has_twelve_edges_around_scene() {
        let mut f = fixture();
        add_cube(&mut f, 5.0);
        update(&mut f);
        let box_actor = f.renderer.actor(f.manager.box_actor.unwrap()).unwrap();
        assert!(box_actor.visible);
        assert_eq!(box_actor.geometry.lines.len(), 12);
        let bounds = box_actor.geometry.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::splat(-5.0));
        assert_eq!(bounds.max, Vec3::splat(5.0));
    }

    #[test]
    fn test_empty_scene_hides_box() {
        let mut f = fixture();
        update(&mut f);
        let box_actor = f.renderer.actor(f.manager.box_actor.unwrap()).unwrap();
        assert!(!box_actor.visible);
    }

    #[test]
    fn test_degenerate_axis_is_padded() {
        let mut f = fixture();
        // Flat quad in the XY plane: zero thickness along z.
        let quad = PolyMesh::plane_quad(Vec3::ZERO, Vec3::X * 10.0, Vec3::Y * 10.0);
        f.scene.add_model_with_display(
            ModelNode::with_mesh("quad", Mesh::Surface(quad)),
            ModelDisplayNode::new("quad display"),
        );
        update(&mut f);
        let box_actor = f.renderer.actor(f.manager.box_actor.unwrap()).unwrap();
        let bounds = box_actor.geometry.bounds().unwrap();
        let thickness = bounds.max.z - bounds.min.z;
        assert!((thickness - 2.0).abs() < 1e-4, "5% of the 20-unit span, both sides");
    }

    #[test]
    fn test_far_side_label_is_hidden() {
        let mut f = fixture();
        add_cube(&mut f, 5.0);
        // Camera above, looking down -z: the inferior label faces away.
        f.renderer.camera.position = Vec3::new(0.0, 0.0, 500.0);
        f.renderer.camera.focal_point = Vec3::ZERO;
        f.renderer.camera.view_up = Vec3::Y;
        update(&mut f);
        let visible: Vec<&str> = f
            .manager
            .label_actors
            .iter()
            .filter_map(|(id, _)| f.renderer.actor(*id))
            .filter(|a| a.visible)
            .filter_map(|a| a.label.as_deref())
            .collect();
        assert!(visible.contains(&"S"));
        assert!(!visible.contains(&"I"));
    }

    #[test]
    fn test_background_and_stereo_sync() {
        let mut f = fixture();
        let view_id = f.manager.core().view_node().clone();
        f.scene.modify(&view_id, |n| {
            if let Some(v) = n.as_view_mut() {
                v.background_color = Vec3::ZERO;
                v.background_color2 = Vec3::ONE;
                v.stereo_type = crate::dmml::StereoType::RedBlue;
            }
        });
        update(&mut f);
        assert_eq!(f.renderer.background_color, Vec3::ZERO);
        assert_eq!(f.renderer.background_color2, Vec3::ONE);
        assert_eq!(f.renderer.stereo_type, crate::dmml::StereoType::RedBlue);
    }

    #[test]
    fn test_box_visible_flag_gates_actor() {
        let mut f = fixture();
        add_cube(&mut f, 5.0);
        let view_id = f.manager.core().view_node().clone();
        f.scene.modify(&view_id, |n| {
            if let Some(v) = n.as_view_mut() {
                v.box_visible = false;
            }
        });
        update(&mut f);
        let box_actor = f.renderer.actor(f.manager.box_actor.unwrap()).unwrap();
        assert!(!box_actor.visible);
    }
}
