//! Abstract displayable manager: lifecycle, rebuild state machine, trait
//!
//! A manager binds to exactly one (renderer, view node, scene) triple,
//! mediated by the group that owns it. Structural changes never rebuild
//! inside an event callback; they move the manager's rebuild state machine
//! to `DirtyPendingRebuild` and the group runs the rebuild at the next safe
//! point (after the event queue drains).

use log::debug;

use crate::broker::{EventBroker, ObserverId};
use crate::dmml::{NodeId, Scene, SceneEvent};
use crate::interaction::InteractionEvent;
use crate::render::Renderer;

/// Reserved interaction distance: always eligible, loses every tie
///
/// Reported by handlers with no spatial representation (camera
/// manipulation), so any widget with a real distance outranks them.
pub const CAMERA_PRIORITY_DISTANCE: f64 = f64::INFINITY;

/// Rebuild state machine of one manager
///
/// The explicit `Rebuilding` state makes the reentrancy guard testable: a
/// rebuild request arriving while a rebuild runs is ignored instead of
/// recursing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    DirtyPendingRebuild,
    Rebuilding,
}

/// State shared by every concrete manager
#[derive(Debug)]
pub struct ManagerCore {
    view_node: NodeId,
    observer: ObserverId,
    created: bool,
    update_state: UpdateState,
    /// True between `SceneClosing` and `SceneClosed`
    closing: bool,
    rebuild_count: u64,
}

impl ManagerCore {
    pub fn new(view_node: NodeId, observer: ObserverId) -> Self {
        Self {
            view_node,
            observer,
            created: false,
            update_state: UpdateState::Idle,
            closing: false,
            rebuild_count: 0,
        }
    }

    /// The view node this manager is bound to
    ///
    /// Binding is an invariant once `create` has run; a missing view node at
    /// access time is a wiring bug in the caller, not a runtime state.
    pub fn view_node(&self) -> &NodeId {
        &self.view_node
    }

    pub fn observer(&self) -> ObserverId {
        self.observer
    }

    /// Marks the one-shot `create` as done
    pub fn mark_created(&mut self) {
        assert!(!self.created, "manager created twice");
        self.created = true;
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Current rebuild state
    pub fn update_state(&self) -> UpdateState {
        self.update_state
    }

    /// Requests a deferred full rebuild
    ///
    /// Ignored while a rebuild is already running (nested trigger).
    pub fn request_update_from_scene(&mut self) {
        match self.update_state {
            UpdateState::Idle => self.update_state = UpdateState::DirtyPendingRebuild,
            UpdateState::DirtyPendingRebuild => {}
            UpdateState::Rebuilding => {
                debug!("rebuild already in progress, ignoring nested request");
            }
        }
    }

    /// Claims a pending rebuild, moving to `Rebuilding`; false if none
    pub fn take_pending_rebuild(&mut self) -> bool {
        if self.update_state == UpdateState::DirtyPendingRebuild {
            self.update_state = UpdateState::Rebuilding;
            true
        } else {
            false
        }
    }

    /// Completes the rebuild, returning to `Idle`
    pub fn finish_rebuild(&mut self) {
        debug_assert_eq!(self.update_state, UpdateState::Rebuilding);
        self.update_state = UpdateState::Idle;
        self.rebuild_count += 1;
    }

    /// Number of completed full rebuilds
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    pub fn set_closing(&mut self, closing: bool) {
        self.closing = closing;
    }

    /// True while the scene is tearing down; heavy recompute is suppressed
    pub fn is_closing(&self) -> bool {
        self.closing
    }
}

/// Mutable collaborator bundle passed into manager callbacks
pub struct ManagerContext<'a> {
    pub scene: &'a mut Scene,
    pub broker: &'a mut EventBroker,
    pub renderer: &'a mut Renderer,
    render_requested: &'a mut bool,
}

impl<'a> ManagerContext<'a> {
    pub(crate) fn new(
        scene: &'a mut Scene,
        broker: &'a mut EventBroker,
        renderer: &'a mut Renderer,
        render_requested: &'a mut bool,
    ) -> Self {
        Self {
            scene,
            broker,
            renderer,
            render_requested,
        }
    }

    /// Records that a redraw is owed without performing it
    ///
    /// The group coalesces any number of requests within one processing
    /// cycle into a single draw submission.
    pub fn request_render(&mut self) {
        *self.render_requested = true;
    }
}

/// A component reflecting one category of scene node into one renderer
pub trait DisplayableManager {
    /// Stable name, for diagnostics
    fn name(&self) -> &'static str;

    fn core(&self) -> &ManagerCore;
    fn core_mut(&mut self) -> &mut ManagerCore;

    /// One-shot setup once scene, renderer and view node are all bound:
    /// register broker observations and build initial pipelines
    fn create(&mut self, ctx: &mut ManagerContext<'_>);

    /// Reaction to one drained scene event this manager observes
    fn process_scene_event(&mut self, event: &SceneEvent, ctx: &mut ManagerContext<'_>);

    /// Full structural rebuild, run by the group at a safe point
    fn update_from_scene(&mut self, ctx: &mut ManagerContext<'_>);

    /// Distance-squared priority for handling this interaction event
    ///
    /// None means "not interested". Smaller distances win;
    /// `CAMERA_PRIORITY_DISTANCE` is always eligible but loses any tie.
    fn can_process_interaction_event(
        &self,
        _event: &InteractionEvent,
        _scene: &Scene,
        _renderer: &Renderer,
    ) -> Option<f64> {
        None
    }

    /// Handles an interaction event this manager won; true if consumed
    fn process_interaction_event(
        &mut self,
        _event: &InteractionEvent,
        _ctx: &mut ManagerContext<'_>,
    ) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::EventBroker;

    fn core() -> ManagerCore {
        let mut broker = EventBroker::new();
        let observer = broker.register_observer();
        ManagerCore::new(NodeId::new("View1"), observer)
    }

    #[test]
    fn test_rebuild_state_machine() {
        let mut core = core();
        assert_eq!(core.update_state(), UpdateState::Idle);
        assert!(!core.take_pending_rebuild());

        core.request_update_from_scene();
        core.request_update_from_scene(); // coalesces
        assert_eq!(core.update_state(), UpdateState::DirtyPendingRebuild);

        assert!(core.take_pending_rebuild());
        assert_eq!(core.update_state(), UpdateState::Rebuilding);

        // Nested trigger during rebuild is ignored.
        core.request_update_from_scene();
        assert_eq!(core.update_state(), UpdateState::Rebuilding);

        core.finish_rebuild();
        assert_eq!(core.update_state(), UpdateState::Idle);
        assert_eq!(core.rebuild_count(), 1);
    }

    #[test]
    #[should_panic(expected = "created twice")]
    fn test_double_create_is_fatal() {
        let mut core = core();
        core.mark_created();
        core.mark_created();
    }
}
