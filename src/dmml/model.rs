//! Displayable model nodes
//!
//! A model node owns the geometry payload and an ordered list of display
//! node IDs; display properties live on the display nodes, never here.

use serde::{Deserialize, Serialize};

use crate::geometry::Mesh;

use super::node::{NodeBase, NodeId};

/// Displayable node holding a mesh payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelNode {
    pub base: NodeBase,
    /// Display nodes of this model, by ID, in draw order
    pub display_ids: Vec<NodeId>,
    /// Geometry payload; None until produced
    mesh: Option<Mesh>,
    /// Layout name of the slice this model proxies in 3D views, if any
    pub slice_proxy_for: Option<String>,
    /// Modification stamp of the mesh payload alone
    #[serde(skip)]
    pub(crate) mesh_mtime: u64,
    /// Set by the mesh setter, consumed by `Scene::modify` to stamp
    /// `mesh_mtime` with the scene counter
    #[serde(skip)]
    pub(crate) mesh_touched: bool,
}

impl ModelNode {
    /// Creates a model with no payload and no display nodes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: NodeBase::named(name),
            display_ids: Vec::new(),
            mesh: None,
            slice_proxy_for: None,
            mesh_mtime: 0,
            mesh_touched: false,
        }
    }

    /// Creates a model already carrying a mesh
    pub fn with_mesh(name: impl Into<String>, mesh: Mesh) -> Self {
        let mut node = Self::new(name);
        node.mesh = Some(mesh);
        node.mesh_touched = true;
        node
    }

    /// The geometry payload
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    /// Replaces the geometry payload, marking the mesh half dirty
    pub fn set_mesh(&mut self, mesh: Option<Mesh>) {
        self.mesh = mesh;
        self.mesh_touched = true;
    }

    /// Modification stamp of the mesh payload
    pub fn mesh_mtime(&self) -> u64 {
        self.mesh_mtime
    }

    /// Adds a display node reference if not already present
    pub fn add_display_id(&mut self, id: NodeId) {
        if !self.display_ids.contains(&id) {
            self.display_ids.push(id);
        }
    }

    /// Removes a display node reference
    pub fn remove_display_id(&mut self, id: &NodeId) {
        self.display_ids.retain(|d| d != id);
    }

    /// True if this model stands in for a slice plane in 3D views
    pub fn is_slice_proxy(&self) -> bool {
        self.slice_proxy_for.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PolyMesh;
    use glam::Vec3;

    #[test]
    fn test_display_id_list_is_deduplicated() {
        let mut model = ModelNode::new("liver");
        let id = NodeId::new("ModelDisplay1");
        model.add_display_id(id.clone());
        model.add_display_id(id.clone());
        assert_eq!(model.display_ids.len(), 1);
        model.remove_display_id(&id);
        assert!(model.display_ids.is_empty());
    }

    #[test]
    fn test_set_mesh_marks_touch() {
        let mut model = ModelNode::new("m");
        assert!(!model.mesh_touched);
        model.set_mesh(Some(Mesh::Surface(PolyMesh::cube(Vec3::ZERO, 1.0))));
        assert!(model.mesh_touched);
    }
}
