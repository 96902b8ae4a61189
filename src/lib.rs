//! Scene-to-renderer synchronization for medical 3D/2D viewing
//!
//! The crate keeps renderers synchronized with a shared scene graph of
//! typed nodes. Mutations queue tagged events; an explicitly owned event
//! broker answers which managers observe what; manager groups drain the
//! queue at safe points, rebuild incrementally, and coalesce any number of
//! render requests into one draw per cycle.
//!
//! Layering, bottom up:
//! - [`geometry`]: mesh containers and the clip/cut/projection filters
//! - [`dmml`]: the scene graph, node types, events, and persistence
//! - [`broker`]: the (subject, event kind, observer) observation registry
//! - [`render`]: the actor store and draw-submission surface
//! - [`picking`]: screen/world picking back to scene entities
//! - [`interaction`]: device-event translation and dispatch types
//! - [`displayable`]: the managers and per-view groups tying it together

pub mod broker;
pub mod displayable;
pub mod dmml;
pub mod geometry;
pub mod interaction;
pub mod picking;
pub mod render;

pub use broker::{EventBroker, ObserverId, Subject};
pub use displayable::{
    process_device_event, process_interaction_event, process_scene_events, slice_view_group,
    three_d_view_group, DisplayableManager, DisplayableManagerGroup,
};
pub use dmml::{Node, NodeId, NodeKind, Scene, SceneError, SceneEvent};
pub use render::Renderer;
