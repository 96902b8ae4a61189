//! Reformat widget manager: interactive slice-plane repositioning in 3D
//!
//! Shows, per slice node that asks for it, a plane outline plus a pickable
//! handle in the 3D view. Dragging the handle translates the slice along
//! its normal and writes the new slice-to-RAS pose back to the slice node,
//! so every slice view follows. The write triggers a `NodeModified` echo
//! for the same slice; a last-pushed guard recognizes it and skips the
//! redundant resync.

use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec3};

use crate::broker::Subject;
use crate::dmml::{EventKind, Node, NodeId, NodeKind, SceneEvent};
use crate::geometry::PolyMesh;
use crate::interaction::InteractionEvent;
use crate::picking::CellPicker;
use crate::render::{Actor, ActorId, DrawGroup, RenderGeometry, Renderer};

use super::manager::{DisplayableManager, ManagerContext, ManagerCore};

/// Half-extent of the plane outline, in slice coordinates
const OUTLINE_HALF_SIZE: f32 = 100.0;
/// Half-extent of the drag handle cube
const HANDLE_HALF_SIZE: f32 = 5.0;

#[derive(Debug)]
struct Widget {
    outline: ActorId,
    handle: ActorId,
}

/// Manager for the interactive reformat widgets of a 3D view
pub struct ReformatWidgetManager {
    core: ManagerCore,
    /// Widgets keyed by slice node ID, created lazily on first request
    widgets: HashMap<NodeId, Widget>,
    /// Last pose this manager wrote per slice, for echo suppression
    last_pushed: HashMap<NodeId, Mat4>,
    dragging: Option<NodeId>,
}

impl ReformatWidgetManager {
    pub fn new(view_node: NodeId, observer: crate::broker::ObserverId) -> Self {
        Self {
            core: ManagerCore::new(view_node, observer),
            widgets: HashMap::new(),
            last_pushed: HashMap::new(),
            dragging: None,
        }
    }

    fn destroy_widget(&mut self, slice_id: &NodeId, ctx: &mut ManagerContext<'_>) {
        if let Some(widget) = self.widgets.remove(slice_id) {
            ctx.renderer.remove_actor(widget.outline);
            ctx.renderer.remove_actor(widget.handle);
            self.last_pushed.remove(slice_id);
            ctx.request_render();
        }
    }

    fn ensure_widget(&mut self, slice_id: &NodeId, ctx: &mut ManagerContext<'_>) {
        if self.widgets.contains_key(slice_id) {
            return;
        }
        let quad = PolyMesh::plane_quad(
            Vec3::ZERO,
            Vec3::X * OUTLINE_HALF_SIZE,
            Vec3::Y * OUTLINE_HALF_SIZE,
        );
        let outline_geometry = RenderGeometry {
            points: quad.points,
            triangles: Vec::new(),
            lines: vec![[0, 1], [1, 2], [2, 3], [3, 0]],
            point_colors: None,
        };
        let mut outline = Actor::new(outline_geometry, DrawGroup::Furniture);
        outline.pickable = false;
        outline.color = Vec3::new(0.9, 0.9, 0.3);

        let handle_geometry =
            RenderGeometry::from_poly_mesh(&PolyMesh::cube(Vec3::ZERO, HANDLE_HALF_SIZE));
        let mut handle = Actor::new(handle_geometry, DrawGroup::Furniture);
        handle.color = Vec3::new(0.9, 0.9, 0.3);

        let widget = Widget {
            outline: ctx.renderer.add_actor(outline),
            handle: ctx.renderer.add_actor(handle),
        };
        self.widgets.insert(slice_id.clone(), widget);
    }

    /// Syncs one widget's pose and visibility from its slice node
    fn sync_widget(&mut self, slice_id: &NodeId, ctx: &mut ManagerContext<'_>) {
        let Some(slice) = ctx.scene.get(slice_id).and_then(Node::as_slice) else {
            self.destroy_widget(slice_id, ctx);
            return;
        };
        if !slice.widget_visible {
            // Lazy: a widget is never built for a slice that has not shown it.
            if let Some(widget) = self.widgets.get(slice_id) {
                let (outline, handle) = (widget.outline, widget.handle);
                if let Some(actor) = ctx.renderer.actor_mut(outline) {
                    actor.visible = false;
                }
                if let Some(actor) = ctx.renderer.actor_mut(handle) {
                    actor.visible = false;
                }
                ctx.request_render();
            }
            return;
        }
        let pose = slice.slice_to_ras;
        self.ensure_widget(slice_id, ctx);
        let widget = &self.widgets[slice_id];
        let (outline, handle) = (widget.outline, widget.handle);
        if let Some(actor) = ctx.renderer.actor_mut(outline) {
            actor.pose = pose;
            actor.visible = true;
        }
        if let Some(actor) = ctx.renderer.actor_mut(handle) {
            actor.pose = pose;
            actor.visible = true;
        }
        ctx.request_render();
    }

    fn sync_all(&mut self, ctx: &mut ManagerContext<'_>) {
        let slice_ids: Vec<NodeId> = ctx
            .scene
            .nodes_of_kind(NodeKind::Slice)
            .map(|n| n.id().clone())
            .collect();
        let stale: Vec<NodeId> = self
            .widgets
            .keys()
            .filter(|id| !slice_ids.contains(id))
            .cloned()
            .collect();
        for id in stale {
            self.destroy_widget(&id, ctx);
        }
        for id in &slice_ids {
            self.sync_widget(id, ctx);
        }
    }

    /// Slice whose handle is under the screen position, with the hit distance
    fn handle_under(&self, position: Vec2, renderer: &Renderer) -> Option<(NodeId, f32)> {
        let ray = renderer.screen_ray(position.x, position.y);
        let hit = CellPicker::default().pick(&ray, renderer)?;
        self.widgets
            .iter()
            .find(|(_, w)| w.handle == hit.actor)
            .map(|(id, _)| (id.clone(), hit.t))
    }

    /// Translates the slice along its normal by a drag delta
    fn drag_slice(&mut self, slice_id: &NodeId, dy: f32, ctx: &mut ManagerContext<'_>) {
        let Some(slice) = ctx.scene.get(slice_id).and_then(Node::as_slice) else {
            return;
        };
        let normal = slice.plane().normal;
        let camera = &ctx.renderer.camera;
        let distance = (camera.focal_point - camera.position).length();
        let world_height = if camera.parallel {
            2.0 * camera.parallel_scale
        } else {
            2.0 * distance * (camera.view_angle.to_radians() / 2.0).tan()
        };
        let per_pixel = world_height / (ctx.renderer.size.1 as f32).max(1.0);
        let shift = Mat4::from_translation(normal * (-dy * per_pixel));

        let mut pushed = Mat4::IDENTITY;
        ctx.scene.modify(slice_id, |node| {
            if let Some(s) = node.as_slice_mut() {
                s.slice_to_ras = shift * s.slice_to_ras;
                pushed = s.slice_to_ras;
            }
        });
        self.last_pushed.insert(slice_id.clone(), pushed);
        // Keep the widget under the cursor; the event echo is suppressed.
        if let Some(widget) = self.widgets.get(slice_id) {
            let (outline, handle) = (widget.outline, widget.handle);
            if let Some(actor) = ctx.renderer.actor_mut(outline) {
                actor.pose = pushed;
            }
            if let Some(actor) = ctx.renderer.actor_mut(handle) {
                actor.pose = pushed;
            }
        }
        ctx.request_render();
    }
}

impl DisplayableManager for ReformatWidgetManager {
    fn name(&self) -> &'static str {
        "ReformatWidgetManager"
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
                if ctx.scene.get(id).map(Node::kind) == Some(NodeKind::Slice) {
                    self.sync_widget(id, ctx);
                }
            }
            SceneEvent::NodeRemoved { id, kind } => {
                if *kind == NodeKind::Slice {
                    self.destroy_widget(id, ctx);
                    if self.dragging.as_ref() == Some(id) {
                        self.dragging = None;
                    }
                }
            }
            SceneEvent::NodeModified(id) => {
                if self.core.is_closing() {
                    return;
                }
                if ctx.scene.get(id).map(Node::kind) != Some(NodeKind::Slice) {
                    return;
                }
                // Echo of our own write-back: the pose already matches.
                let own_echo = self
                    .last_pushed
                    .get(id)
                    .zip(ctx.scene.get(id).and_then(Node::as_slice))
                    .is_some_and(|(pushed, slice)| *pushed == slice.slice_to_ras);
                if !own_echo {
                    self.last_pushed.remove(id);
                    self.sync_widget(id, ctx);
                }
            }
            SceneEvent::BatchProcessingEnded => self.core.request_update_from_scene(),
            SceneEvent::SceneClosing => {
                self.core.set_closing(true);
                let ids: Vec<NodeId> = self.widgets.keys().cloned().collect();
                for id in ids {
                    self.destroy_widget(&id, ctx);
                }
                self.dragging = None;
            }
            SceneEvent::SceneClosed => {
                self.core.set_closing(false);
                self.widgets.clear();
                self.last_pushed.clear();
            }
            _ => {}
        }
    }

    fn update_from_scene(&mut self, ctx: &mut ManagerContext<'_>) {
        if self.core.is_closing() {
            return;
        }
        self.sync_all(ctx);
    }

    fn can_process_interaction_event(
        &self,
        event: &InteractionEvent,
        _scene: &crate::dmml::Scene,
        renderer: &Renderer,
    ) -> Option<f64> {
        if self.dragging.is_some() {
            return Some(0.0);
        }
        match event {
            InteractionEvent::Press { position, .. } => self
                .handle_under(*position, renderer)
                .map(|(_, t)| (t as f64) * (t as f64)),
            _ => None,
        }
    }

    fn process_interaction_event(
        &mut self,
        event: &InteractionEvent,
        ctx: &mut ManagerContext<'_>,
    ) -> bool {
        match event {
            InteractionEvent::Press { position, .. } => {
                if let Some((slice_id, _)) = self.handle_under(*position, ctx.renderer) {
                    self.dragging = Some(slice_id);
                    true
                } else {
                    false
                }
            }
            InteractionEvent::Drag { from, to, .. } => {
                let Some(slice_id) = self.dragging.clone() else {
                    return false;
                };
                self.drag_slice(&slice_id, to.y - from.y, ctx);
                true
            }
            InteractionEvent::Release { .. } => {
                let was_dragging = self.dragging.take().is_some();
                was_dragging
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::EventBroker;
    use crate::dmml::view::{SliceNode, ViewNode};
    use crate::dmml::Scene;
    use crate::interaction::{Modifiers, MouseButton};

    struct Fixture {
        scene: Scene,
        broker: EventBroker,
        renderer: Renderer,
        manager: ReformatWidgetManager,
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
            manager: ReformatWidgetManager::new(view, observer),
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

    fn add_slice(f: &mut Fixture, widget_visible: bool) -> NodeId {
        let mut slice = SliceNode::axial("Red");
        slice.widget_visible = widget_visible;
        f.scene.add_node(Node::Slice(slice))
    }

    #[test]
    fn test_widget_is_lazy() {
        let mut f = fixture();
        add_slice(&mut f, false);
        update(&mut f);
        assert_eq!(f.renderer.actor_count(), 0);
    }

    #[test]
    fn test_widget_appears_when_requested() {
        let mut f = fixture();
        let slice_id = add_slice(&mut f, true);
        update(&mut f);
        assert_eq!(f.renderer.actor_count(), 2);

        f.scene.modify(&slice_id, |n| {
            if let Some(s) = n.as_slice_mut() {
                s.widget_visible = false;
            }
        });
        update(&mut f);
        // Hidden, not destroyed.
        assert_eq!(f.renderer.actor_count(), 2);
        assert!(f.renderer.actors().all(|(_, a)| !a.visible));
    }

    #[test]
    fn test_external_slice_move_resyncs_pose() {
        let mut f = fixture();
        let slice_id = add_slice(&mut f, true);
        update(&mut f);
        let pose = Mat4::from_translation(Vec3::new(0.0, 0.0, 25.0));
        f.scene.modify(&slice_id, |n| {
            if let Some(s) = n.as_slice_mut() {
                s.slice_to_ras = pose;
            }
        });
        update(&mut f);
        let widget = &f.manager.widgets[&slice_id];
        assert_eq!(f.renderer.actor(widget.handle).unwrap().pose, pose);
    }

    #[test]
    fn test_drag_writes_pose_back_to_slice_node() {
        let mut f = fixture();
        let slice_id = add_slice(&mut f, true);
        update(&mut f);

        let press = InteractionEvent::Press {
            button: MouseButton::Left,
            position: Vec2::new(256.0, 256.0),
            modifiers: Modifiers::default(),
        };
        // Default camera at (0, 500, 0) rays through the handle at the origin.
        assert!(f
            .manager
            .can_process_interaction_event(&press, &f.scene, &f.renderer)
            .is_some());
        let mut render_requested = false;
        let mut ctx = ManagerContext::new(
            &mut f.scene,
            &mut f.broker,
            &mut f.renderer,
            &mut render_requested,
        );
        assert!(f.manager.process_interaction_event(&press, &mut ctx));

        let drag = InteractionEvent::Drag {
            button: MouseButton::Left,
            from: Vec2::new(256.0, 256.0),
            to: Vec2::new(256.0, 236.0),
            modifiers: Modifiers::default(),
        };
        assert!(f.manager.process_interaction_event(&drag, &mut ctx));
        let release = InteractionEvent::Release {
            button: MouseButton::Left,
            position: Vec2::new(256.0, 236.0),
        };
        assert!(f.manager.process_interaction_event(&release, &mut ctx));

        // Dragging up moved the axial slice along +z.
        let slice = f.scene.get(&slice_id).unwrap().as_slice().unwrap();
        let origin = slice.slice_to_ras.transform_point3(Vec3::ZERO);
        assert!(origin.z > 1.0, "slice origin after drag: {origin:?}");
        // The write-back is recorded for echo suppression.
        assert_eq!(f.manager.last_pushed[&slice_id], slice.slice_to_ras);
    }

    #[test]
    fn test_pose_echo_is_suppressed_but_external_change_is_not() {
        let mut f = fixture();
        let slice_id = add_slice(&mut f, true);
        update(&mut f);

        let pose = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        f.scene.modify(&slice_id, |n| {
            if let Some(s) = n.as_slice_mut() {
                s.slice_to_ras = pose;
            }
        });
        f.manager.last_pushed.insert(slice_id.clone(), pose);

        let mut render_requested = false;
        let mut ctx = ManagerContext::new(
            &mut f.scene,
            &mut f.broker,
            &mut f.renderer,
            &mut render_requested,
        );
        f.manager
            .process_scene_event(&SceneEvent::NodeModified(slice_id.clone()), &mut ctx);
        // Echo: the guard stays armed.
        assert!(f.manager.last_pushed.contains_key(&slice_id));

        let other = Mat4::from_translation(Vec3::new(0.0, 0.0, 9.0));
        ctx.scene.modify(&slice_id, |n| {
            if let Some(s) = n.as_slice_mut() {
                s.slice_to_ras = other;
            }
        });
        f.manager
            .process_scene_event(&SceneEvent::NodeModified(slice_id.clone()), &mut ctx);
        assert!(!f.manager.last_pushed.contains_key(&slice_id));
        let widget = &f.manager.widgets[&slice_id];
        assert_eq!(ctx.renderer.actor(widget.handle).unwrap().pose, other);
    }
}
