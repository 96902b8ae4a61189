//! Renderer abstraction: actors, camera, draw submission

pub mod actor;
pub mod camera;
pub mod renderer;

pub use actor::{Actor, DrawGroup, RenderGeometry};
pub use camera::{Ray, RenderCamera};
pub use renderer::{ActorId, Renderer};
