//! Displayable managers: the scene-to-renderer synchronization layer
//!
//! Each manager owns one concern of one view (model surfaces, slice
//! footprints, camera binding, view furniture, reformat widgets) and keeps
//! its renderer state synchronized with the scene through broker-filtered
//! events and deferred rebuilds. The group owns the managers of one view
//! and drives the processing cycle.

pub mod camera;
pub mod group;
pub mod manager;
pub mod model;
pub mod model_slice;
pub mod reformat;
pub mod view;

pub use camera::CameraDisplayableManager;
pub use group::{
    process_device_event, process_interaction_event, process_scene_events, slice_view_group,
    three_d_view_group, DisplayableManagerGroup,
};
pub use manager::{
    DisplayableManager, ManagerContext, ManagerCore, UpdateState, CAMERA_PRIORITY_DISTANCE,
};
pub use model::ModelDisplayableManager;
pub use model_slice::ModelSliceDisplayableManager;
pub use reformat::ReformatWidgetManager;
pub use view::ViewDisplayableManager;
