//! Camera displayable manager
//!
//! Keeps exactly one active camera node bound per 3D view, resolving the
//! binding by layout name. The binding is re-resolved on import, node add
//! and node remove — a camera node can appear, disappear or be renamed at
//! any time — and a default camera is created when none matches. Dependent
//! managers learn about rebinds through `ActiveCameraChanged` instead of
//! polling.
//!
//! Camera manipulation (orbit, pan, zoom) is handled here at the reserved
//! lowest interaction priority and always writes through the camera node,
//! so the render camera updates via the normal broker round-trip.

use glam::Vec3;
use log::debug;

use crate::broker::{ObserverId, Subject};
use crate::dmml::{CameraNode, EventKind, Node, NodeId, NodeKind, Scene, SceneEvent};
use crate::interaction::{InteractionEvent, MouseButton};

use super::manager::{
    DisplayableManager, ManagerContext, ManagerCore, CAMERA_PRIORITY_DISTANCE,
};

const ORBIT_SENSITIVITY: f32 = 0.01;
const ZOOM_SENSITIVITY: f32 = 0.1;
const MIN_CAMERA_DISTANCE: f32 = 0.01;

/// Name given to auto-created camera nodes
pub const DEFAULT_CAMERA_NAME: &str = "Default Scene Camera";

/// Manager binding one camera node to one 3D view
pub struct CameraDisplayableManager {
    core: ManagerCore,
    active_camera: Option<NodeId>,
}

impl CameraDisplayableManager {
    pub fn new(view_node: NodeId, observer: ObserverId) -> Self {
        Self {
            core: ManagerCore::new(view_node, observer),
            active_camera: None,
        }
    }

    /// The currently bound camera node
    pub fn active_camera(&self) -> Option<&NodeId> {
        self.active_camera.as_ref()
    }

    fn layout_name(&self, scene: &Scene) -> String {
        scene
            .get(self.core.view_node())
            .and_then(Node::as_view)
            .expect("camera manager bound to a missing or non-view node")
            .layout_name
            .clone()
    }

    /// Re-resolves the camera-to-view binding, creating a default camera
    /// when no camera node matches the view's layout name
    fn resolve_camera(&mut self, ctx: &mut ManagerContext<'_>) {
        let layout = self.layout_name(ctx.scene);
        let found = ctx
            .scene
            .camera_by_layout(&layout)
            .map(|c| c.base.id.clone());
        let camera_id = match found {
            Some(id) => id,
            None => {
                debug!("no camera for layout {layout}, creating default");
                let mut camera = CameraNode::new(layout.clone());
                camera.base.name = DEFAULT_CAMERA_NAME.to_string();
                camera.base.description = format!("Auto-created camera for view {layout}");
                ctx.scene.add_node(Node::Camera(camera))
            }
        };
        if self.active_camera.as_ref() == Some(&camera_id) {
            return;
        }
        if let Some(old) = self.active_camera.take() {
            ctx.broker.remove_observations(
                self.core.observer(),
                Some(&Subject::Node(old)),
                Some(EventKind::NodeModified),
            );
        }
        ctx.broker.add_observation(
            Subject::Node(camera_id.clone()),
            EventKind::NodeModified,
            self.core.observer(),
        );
        self.active_camera = Some(camera_id.clone());
        ctx.scene.push_event(SceneEvent::ActiveCameraChanged {
            view: self.core.view_node().clone(),
            camera: camera_id,
        });
        self.sync_render_camera(ctx);
        ctx.request_render();
    }

    /// Pushes the active camera node's state into the render camera
    fn sync_render_camera(&self, ctx: &mut ManagerContext<'_>) {
        let Some(camera) = self
            .active_camera
            .as_ref()
            .and_then(|id| ctx.scene.get(id))
            .and_then(Node::as_camera)
        else {
            return;
        };
        let rc = &mut ctx.renderer.camera;
        rc.position = camera.position;
        rc.focal_point = camera.focal_point;
        rc.view_up = camera.view_up;
        rc.view_angle = camera.view_angle;
        rc.parallel = camera.parallel_projection;
        rc.parallel_scale = camera.parallel_scale;
    }

    fn with_camera_node(
        &self,
        ctx: &mut ManagerContext<'_>,
        f: impl FnOnce(&mut CameraNode),
    ) -> bool {
        let Some(id) = self.active_camera.clone() else {
            return false;
        };
        ctx.scene.modify(&id, |node| {
            if let Some(camera) = node.as_camera_mut() {
                f(camera);
            }
        })
    }
}

/// Orbits the camera around its focal point (RAS is z-up)
fn orbit(camera: &mut CameraNode, dx: f32, dy: f32) {
    let offset = camera.position - camera.focal_point;
    let radius = offset.length().max(MIN_CAMERA_DISTANCE);
    let mut theta = offset.y.atan2(offset.x);
    let mut phi = (offset.z / radius).acos();
    theta -= dx * ORBIT_SENSITIVITY;
    phi += dy * ORBIT_SENSITIVITY;
    phi = phi.clamp(0.01, std::f32::consts::PI - 0.01);
    camera.position = camera.focal_point
        + Vec3::new(
            radius * phi.sin() * theta.cos(),
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
        );
}

/// Pans position and focal point together in the view plane
fn pan(camera: &mut CameraNode, dx: f32, dy: f32, viewport_height: f32) {
    let forward = camera.view_direction();
    let right = forward.cross(camera.view_up).normalize_or_zero();
    let up = right.cross(forward).normalize_or_zero();
    let distance = (camera.focal_point - camera.position).length();
    let world_height = if camera.parallel_projection {
        2.0 * camera.parallel_scale
    } else {
        2.0 * distance * (camera.view_angle.to_radians() / 2.0).tan()
    };
    let world_per_pixel = world_height / viewport_height.max(1.0);
    let shift = right * (-dx * world_per_pixel) + up * (dy * world_per_pixel);
    camera.position += shift;
    camera.focal_point += shift;
}

/// Moves the camera along its view direction (or scales, when parallel)
fn zoom(camera: &mut CameraNode, amount: f32) {
    let factor = (1.0 - amount * ZOOM_SENSITIVITY).max(0.1);
    if camera.parallel_projection {
        camera.parallel_scale = (camera.parallel_scale * factor).max(MIN_CAMERA_DISTANCE);
    } else {
        let direction = camera.view_direction();
        let distance = (camera.focal_point - camera.position).length();
        let new_distance = (distance * factor).max(MIN_CAMERA_DISTANCE);
        camera.position = camera.focal_point - direction * new_distance;
    }
}

impl DisplayableManager for CameraDisplayableManager {
    fn name(&self) -> &'static str {
        "CameraDisplayableManager"
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
            EventKind::BatchProcessingEnded,
            EventKind::SceneClosing,
            EventKind::SceneClosed,
        ] {
            ctx.broker.add_observation(Subject::Scene, kind, observer);
        }
        self.core.mark_created();
        self.resolve_camera(ctx);
    }

    fn process_scene_event(&mut self, event: &SceneEvent, ctx: &mut ManagerContext<'_>) {
        match event {
            SceneEvent::NodeAdded(id) => {
                // A camera appearing for our layout may take over the
                // binding (e.g. scene restore bringing back a saved camera).
                if self.active_camera.as_ref() != Some(id)
                    && ctx.scene.get(id).and_then(Node::as_camera).is_some()
                {
                    self.resolve_camera(ctx);
                }
            }
            SceneEvent::NodeRemoved { id, kind } => {
                if *kind == NodeKind::Camera {
                    ctx.broker.remove_subject(id);
                    if self.active_camera.as_ref() == Some(id) {
                        self.active_camera = None;
                        if !self.core.is_closing() {
                            self.resolve_camera(ctx);
                        }
                    }
                }
            }
            SceneEvent::NodeModified(id) => {
                if self.active_camera.as_ref() == Some(id) {
                    self.sync_render_camera(ctx);
                    ctx.request_render();
                }
            }
            SceneEvent::BatchProcessingEnded => {
                self.resolve_camera(ctx);
                self.sync_render_camera(ctx);
                ctx.request_render();
            }
            SceneEvent::SceneClosing => self.core.set_closing(true),
            SceneEvent::SceneClosed => {
                self.active_camera = None;
                self.core.set_closing(false);
            }
            _ => {}
        }
    }

    fn update_from_scene(&mut self, ctx: &mut ManagerContext<'_>) {
        self.resolve_camera(ctx);
        self.sync_render_camera(ctx);
        ctx.request_render();
    }

    fn can_process_interaction_event(
        &self,
        event: &InteractionEvent,
        _scene: &Scene,
        _renderer: &crate::render::Renderer,
    ) -> Option<f64> {
        match event {
            InteractionEvent::Drag { .. }
            | InteractionEvent::Scroll { .. }
            | InteractionEvent::Press { .. }
            | InteractionEvent::Release { .. } => Some(CAMERA_PRIORITY_DISTANCE),
            _ => None,
        }
    }

    fn process_interaction_event(
        &mut self,
        event: &InteractionEvent,
        ctx: &mut ManagerContext<'_>,
    ) -> bool {
        let viewport_height = ctx.renderer.size.1 as f32;
        match event {
            InteractionEvent::Drag {
                button, from, to, ..
            } => {
                let dx = to.x - from.x;
                let dy = to.y - from.y;
                match button {
                    MouseButton::Left => self.with_camera_node(ctx, |c| orbit(c, dx, dy)),
                    MouseButton::Middle => {
                        self.with_camera_node(ctx, |c| pan(c, dx, dy, viewport_height))
                    }
                    MouseButton::Right => {
                        self.with_camera_node(ctx, |c| zoom(c, -dy * 0.1))
                    }
                }
            }
            InteractionEvent::Scroll { delta, .. } => {
                let delta = *delta;
                self.with_camera_node(ctx, |c| zoom(c, delta))
            }
            // Presses and releases only bracket the drag.
            InteractionEvent::Press { .. } | InteractionEvent::Release { .. } => true,
            _ => false,
        }
    }
}
