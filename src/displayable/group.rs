//! Displayable manager group: per-view orchestration of managers
//!
//! A group owns one renderer and the managers serving one view. It drives
//! the processing cycle: drain the scene event queue, fan each event out to
//! the managers whose broker observations match, run the deferred rebuilds
//! claimed during dispatch, and repeat until quiescent. Render requests
//! accumulated anywhere in the cycle coalesce into at most one draw
//! submission per group.
//!
//! Interaction events dispatch to the single manager reporting the smallest
//! distance, with ties broken by registration order; a manager that accepts
//! a press captures the pointer until release.

use log::warn;

use crate::broker::EventBroker;
use crate::dmml::{NodeId, Scene, SceneEvent};
use crate::interaction::{DeviceEvent, InteractionEvent, ViewInteractorStyle};
use crate::render::Renderer;

use super::camera::CameraDisplayableManager;
use super::manager::{DisplayableManager, ManagerContext};
use super::model::ModelDisplayableManager;
use super::model_slice::ModelSliceDisplayableManager;
use super::reformat::ReformatWidgetManager;
use super::view::ViewDisplayableManager;

/// Cap on drain/rebuild passes per cycle; exceeding it means managers keep
/// feeding each other events
const MAX_PASSES: u32 = 16;

/// The managers and renderer of one view
pub struct DisplayableManagerGroup {
    view_node: NodeId,
    managers: Vec<Box<dyn DisplayableManager>>,
    renderer: Renderer,
    render_requested: bool,
    captured: Option<usize>,
    interactor: ViewInteractorStyle,
}

impl DisplayableManagerGroup {
    pub fn new(view_node: NodeId) -> Self {
        Self {
            view_node,
            managers: Vec::new(),
            renderer: Renderer::new(),
            render_requested: false,
            captured: None,
            interactor: ViewInteractorStyle::new(),
        }
    }

    /// The view (or slice) node this group serves
    pub fn view_node(&self) -> &NodeId {
        &self.view_node
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Registered managers, in registration order
    pub fn managers(&self) -> &[Box<dyn DisplayableManager>] {
        &self.managers
    }

    pub fn add_manager(&mut self, manager: Box<dyn DisplayableManager>) {
        self.managers.push(manager);
    }

    /// Runs the one-shot `create` of every manager
    ///
    /// Does not drain the event queue: with several groups on one scene the
    /// caller initializes every group first, then runs one shared
    /// `process_scene_events` so no group consumes events meant for another.
    pub fn initialize(&mut self, scene: &mut Scene, broker: &mut EventBroker) {
        for manager in &mut self.managers {
            let mut ctx = ManagerContext::new(
                scene,
                broker,
                &mut self.renderer,
                &mut self.render_requested,
            );
            manager.create(&mut ctx);
        }
    }

    /// Full processing cycle for a single-group application
    pub fn process_pending(&mut self, scene: &mut Scene, broker: &mut EventBroker) {
        process_scene_events(scene, broker, &mut [self]);
    }

    fn dispatch_event(
        &mut self,
        event: &SceneEvent,
        scene: &mut Scene,
        broker: &mut EventBroker,
    ) {
        for manager in &mut self.managers {
            if broker.wants(manager.core().observer(), event) {
                let mut ctx = ManagerContext::new(
                    scene,
                    broker,
                    &mut self.renderer,
                    &mut self.render_requested,
                );
                manager.process_scene_event(event, &mut ctx);
            }
        }
    }

    /// Runs the rebuilds claimed during dispatch; true if any ran
    fn run_rebuilds(&mut self, scene: &mut Scene, broker: &mut EventBroker) -> bool {
        let mut did_work = false;
        for manager in &mut self.managers {
            if manager.core_mut().take_pending_rebuild() {
                did_work = true;
                let mut ctx = ManagerContext::new(
                    scene,
                    broker,
                    &mut self.renderer,
                    &mut self.render_requested,
                );
                manager.update_from_scene(&mut ctx);
                manager.core_mut().finish_rebuild();
            }
        }
        did_work
    }

    /// Submits at most one draw for everything requested this cycle
    fn flush_render(&mut self) {
        if std::mem::take(&mut self.render_requested) {
            self.renderer.render();
        }
    }

    /// Translates a raw device event and dispatches it
    ///
    /// Single-group convenience, like [`Self::handle_interaction`]; with
    /// several groups on one scene use [`process_device_event`].
    pub fn handle_device_event(
        &mut self,
        event: &DeviceEvent,
        scene: &mut Scene,
        broker: &mut EventBroker,
    ) -> bool {
        let Some(interaction) = self.interactor.translate(event) else {
            return false;
        };
        self.handle_interaction(&interaction, scene, broker)
    }

    /// Dispatches one interaction event and runs a full processing cycle
    ///
    /// Single-group convenience: the cycle at the end drains the scene
    /// queue into this group only. With several groups on one scene use
    /// [`process_interaction_event`] so the handler's scene mutations
    /// round-trip into every group.
    pub fn handle_interaction(
        &mut self,
        event: &InteractionEvent,
        scene: &mut Scene,
        broker: &mut EventBroker,
    ) -> bool {
        let processed = self.dispatch_interaction(event, scene, broker);
        self.process_pending(scene, broker);
        processed
    }

    /// Dispatches one interaction event to the winning manager
    ///
    /// The capturing manager (if any) wins outright; otherwise the smallest
    /// reported distance wins and ties keep the earliest-registered manager.
    /// The caller runs the processing cycle afterwards so the mutations the
    /// handler performed through the scene round-trip into the renderers.
    fn dispatch_interaction(
        &mut self,
        event: &InteractionEvent,
        scene: &mut Scene,
        broker: &mut EventBroker,
    ) -> bool {
        let winner = match self.captured {
            Some(index) => Some(index),
            None => {
                let mut best: Option<(f64, usize)> = None;
                for (index, manager) in self.managers.iter().enumerate() {
                    if let Some(distance) =
                        manager.can_process_interaction_event(event, scene, &self.renderer)
                    {
                        if best.map_or(true, |(d, _)| distance < d) {
                            best = Some((distance, index));
                        }
                    }
                }
                best.map(|(_, index)| index)
            }
        };
        let Some(index) = winner else {
            return false;
        };

        let mut ctx = ManagerContext::new(
            scene,
            broker,
            &mut self.renderer,
            &mut self.render_requested,
        );
        let processed = self.managers[index].process_interaction_event(event, &mut ctx);

        if processed && event.begins_interaction() {
            self.captured = Some(index);
        }
        if event.ends_interaction() {
            self.captured = None;
        }
        processed
    }
}

/// Shared processing cycle over every group of one scene
///
/// Each queued event is popped once and fanned out to all groups, so a
/// multi-view application must route all its groups through a single call.
/// Repeats drain + rebuild until quiescent, then flushes at most one draw
/// per group.
pub fn process_scene_events(
    scene: &mut Scene,
    broker: &mut EventBroker,
    groups: &mut [&mut DisplayableManagerGroup],
) {
    for _ in 0..MAX_PASSES {
        let mut did_work = false;
        while let Some(event) = scene.pop_event() {
            did_work = true;
            for group in groups.iter_mut() {
                group.dispatch_event(&event, scene, broker);
            }
        }
        for group in groups.iter_mut() {
            did_work |= group.run_rebuilds(scene, broker);
        }
        if !did_work {
            break;
        }
    }
    if scene.pending_events() > 0 {
        warn!(
            "scene events still pending after {MAX_PASSES} passes, deferring to the next cycle"
        );
    }
    for group in groups.iter_mut() {
        group.flush_render();
    }
}

/// Dispatches one interaction event for one view of a multi-view application
///
/// The event goes to the target group's winning manager; the shared cycle
/// afterwards routes the handler's scene mutations into every group, so a
/// widget drag in one view updates the views that observe the same node.
pub fn process_interaction_event(
    scene: &mut Scene,
    broker: &mut EventBroker,
    groups: &mut [&mut DisplayableManagerGroup],
    target: usize,
    event: &InteractionEvent,
) -> bool {
    let processed = groups[target].dispatch_interaction(event, scene, broker);
    process_scene_events(scene, broker, groups);
    processed
}

/// Translates a raw device event for one view and dispatches it
pub fn process_device_event(
    scene: &mut Scene,
    broker: &mut EventBroker,
    groups: &mut [&mut DisplayableManagerGroup],
    target: usize,
    event: &DeviceEvent,
) -> bool {
    let Some(interaction) = groups[target].interactor.translate(event) else {
        return false;
    };
    process_interaction_event(scene, broker, groups, target, &interaction)
}

/// Standard manager stack of a 3D view
pub fn three_d_view_group(
    view_node: NodeId,
    broker: &mut EventBroker,
) -> DisplayableManagerGroup {
    let mut group = DisplayableManagerGroup::new(view_node.clone());
    group.add_manager(Box::new(ModelDisplayableManager::new(
        view_node.clone(),
        broker.register_observer(),
    )));
    group.add_manager(Box::new(ViewDisplayableManager::new(
        view_node.clone(),
        broker.register_observer(),
    )));
    group.add_manager(Box::new(ReformatWidgetManager::new(
        view_node.clone(),
        broker.register_observer(),
    )));
    group.add_manager(Box::new(CameraDisplayableManager::new(
        view_node,
        broker.register_observer(),
    )));
    group
}

/// Standard manager stack of a 2D slice view
pub fn slice_view_group(
    slice_node: NodeId,
    broker: &mut EventBroker,
) -> DisplayableManagerGroup {
    let mut group = DisplayableManagerGroup::new(slice_node.clone());
    group.add_manager(Box::new(ModelSliceDisplayableManager::new(
        slice_node,
        broker.register_observer(),
    )));
    group
}
