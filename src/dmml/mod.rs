//! The DMML scene graph: typed nodes, events, transforms, persistence

pub mod display;
pub mod events;
pub mod model;
pub mod node;
pub mod scene;
pub mod transform;
pub mod view;

pub use display::{ModelDisplayNode, SliceDisplayMode};
pub use events::{EventKind, SceneEvent};
pub use model::ModelNode;
pub use node::{Node, NodeBase, NodeId, NodeKind};
pub use scene::{Scene, SceneError};
pub use transform::{DisplacementField, Transform, TransformNode, WorldTransform};
pub use view::{CameraNode, ClipNode, FolderNode, RenderMode, SliceNode, StereoType, ViewNode};
