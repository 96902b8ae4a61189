//! Scene node identity and the typed node union
//!
//! Every node in the DMML scene is stored in the scene arena and addressed by
//! a stable string ID. Cross-references between nodes (display lists,
//! transform parents, folder parents) are always by ID, never by pointer, so
//! removing a node can never leave a dangling reference — only an
//! unresolvable ID that lookups treat as "not present".

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::display::ModelDisplayNode;
use super::model::ModelNode;
use super::transform::TransformNode;
use super::view::{CameraNode, ClipNode, FolderNode, SliceNode, ViewNode};

/// Stable, scene-unique identifier of a node
///
/// Generated by the scene as `<ClassTag><counter>` ("Model1",
/// "ModelDisplay2", ...) and preserved across save/restore.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates an ID from an explicit string (used by scene restore)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The underlying string form of the ID
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the placeholder ID of a node not yet added to a scene
    pub fn is_unset(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self(String::new())
    }
}

/// State shared by every node kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeBase {
    /// Scene-unique ID, assigned when the node is added to a scene
    pub id: NodeId,
    /// Human-readable name, not required to be unique
    pub name: String,
    /// Free-form description (auto-created nodes get a recognizable one)
    pub description: String,
    /// Typed string attributes
    pub attributes: HashMap<String, String>,
    /// Parent transform node, by ID (weak reference)
    pub parent_transform: Option<NodeId>,
    /// Parent hierarchy folder, by ID (weak reference)
    pub parent_folder: Option<NodeId>,
    /// Modification stamp, bumped by `Scene::modify`
    #[serde(skip)]
    pub(crate) mtime: u64,
}

impl NodeBase {
    /// Creates a base with the given name and everything else unset
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Modification stamp of this node
    pub fn mtime(&self) -> u64 {
        self.mtime
    }
}

/// Discriminant of the node union, used in events and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Model,
    ModelDisplay,
    Transform,
    Camera,
    View,
    Slice,
    Folder,
    Clip,
}

impl NodeKind {
    /// Class tag used as the prefix of generated node IDs
    pub fn class_tag(self) -> &'static str {
        match self {
            NodeKind::Model => "Model",
            NodeKind::ModelDisplay => "ModelDisplay",
            NodeKind::Transform => "Transform",
            NodeKind::Camera => "Camera",
            NodeKind::View => "View",
            NodeKind::Slice => "Slice",
            NodeKind::Folder => "Folder",
            NodeKind::Clip => "Clip",
        }
    }
}

/// The typed node union stored in the scene arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Model(ModelNode),
    ModelDisplay(ModelDisplayNode),
    Transform(TransformNode),
    Camera(CameraNode),
    View(ViewNode),
    Slice(SliceNode),
    Folder(FolderNode),
    Clip(ClipNode),
}

impl Node {
    /// Shared base state of any node kind
    pub fn base(&self) -> &NodeBase {
        match self {
            Node::Model(n) => &n.base,
            Node::ModelDisplay(n) => &n.base,
            Node::Transform(n) => &n.base,
            Node::Camera(n) => &n.base,
            Node::View(n) => &n.base,
            Node::Slice(n) => &n.base,
            Node::Folder(n) => &n.base,
            Node::Clip(n) => &n.base,
        }
    }

    /// Mutable access to the shared base state
    pub fn base_mut(&mut self) -> &mut NodeBase {
        match self {
            Node::Model(n) => &mut n.base,
            Node::ModelDisplay(n) => &mut n.base,
            Node::Transform(n) => &mut n.base,
            Node::Camera(n) => &mut n.base,
            Node::View(n) => &mut n.base,
            Node::Slice(n) => &mut n.base,
            Node::Folder(n) => &mut n.base,
            Node::Clip(n) => &mut n.base,
        }
    }

    /// Scene-unique ID of this node
    pub fn id(&self) -> &NodeId {
        &self.base().id
    }

    /// Human-readable name of this node
    pub fn name(&self) -> &str {
        &self.base().name
    }

    /// Discriminant of this node
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Model(_) => NodeKind::Model,
            Node::ModelDisplay(_) => NodeKind::ModelDisplay,
            Node::Transform(_) => NodeKind::Transform,
            Node::Camera(_) => NodeKind::Camera,
            Node::View(_) => NodeKind::View,
            Node::Slice(_) => NodeKind::Slice,
            Node::Folder(_) => NodeKind::Folder,
            Node::Clip(_) => NodeKind::Clip,
        }
    }

    pub fn as_model(&self) -> Option<&ModelNode> {
        match self {
            Node::Model(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_model_mut(&mut self) -> Option<&mut ModelNode> {
        match self {
            Node::Model(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_display(&self) -> Option<&ModelDisplayNode> {
        match self {
            Node::ModelDisplay(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_display_mut(&mut self) -> Option<&mut ModelDisplayNode> {
        match self {
            Node::ModelDisplay(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_transform(&self) -> Option<&TransformNode> {
        match self {
            Node::Transform(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_transform_mut(&mut self) -> Option<&mut TransformNode> {
        match self {
            Node::Transform(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_camera(&self) -> Option<&CameraNode> {
        match self {
            Node::Camera(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_camera_mut(&mut self) -> Option<&mut CameraNode> {
        match self {
            Node::Camera(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_view(&self) -> Option<&ViewNode> {
        match self {
            Node::View(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_view_mut(&mut self) -> Option<&mut ViewNode> {
        match self {
            Node::View(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&SliceNode> {
        match self {
            Node::Slice(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_slice_mut(&mut self) -> Option<&mut SliceNode> {
        match self {
            Node::Slice(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_folder(&self) -> Option<&FolderNode> {
        match self {
            Node::Folder(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_folder_mut(&mut self) -> Option<&mut FolderNode> {
        match self {
            Node::Folder(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_clip(&self) -> Option<&ClipNode> {
        match self {
            Node::Clip(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_clip_mut(&mut self) -> Option<&mut ClipNode> {
        match self {
            Node::Clip(n) => Some(n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_class_tags_are_distinct() {
        let kinds = [
            NodeKind::Model,
            NodeKind::ModelDisplay,
            NodeKind::Transform,
            NodeKind::Camera,
            NodeKind::View,
            NodeKind::Slice,
            NodeKind::Folder,
            NodeKind::Clip,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in kinds.iter().skip(i + 1) {
                assert_ne!(a.class_tag(), b.class_tag());
            }
        }
    }

    #[test]
    fn test_unset_id() {
        let id = NodeId::default();
        assert!(id.is_unset());
        assert!(!NodeId::new("Model1").is_unset());
    }
}
