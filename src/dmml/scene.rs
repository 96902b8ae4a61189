//! The DMML scene: an arena of typed nodes addressed by stable IDs
//!
//! The scene owns every node exclusively; all cross-references are by ID and
//! resolve through the arena. Mutation goes through `modify`, which stamps
//! the node and queues a `NodeModified` event. Events are queued, never
//! dispatched synchronously, so a mutation performed from inside an event
//! handler simply queues follow-up work for the same drain loop instead of
//! re-entering observers.

use std::collections::{HashMap, VecDeque};

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::events::SceneEvent;
use super::node::{Node, NodeId, NodeKind};
use super::transform::{Transform, WorldCache, WorldTransform};
use super::view::{CameraNode, ClipNode, SliceNode, ViewNode};

/// Errors of the scene save/restore surface
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("node ID {0} already exists in the scene")]
    DuplicateId(NodeId),
}

/// Serialized form of a scene
#[derive(Serialize, Deserialize)]
struct SceneFile {
    nodes: Vec<Node>,
    counters: HashMap<String, u64>,
}

/// The shared, mutable scene graph
#[derive(Debug, Default)]
pub struct Scene {
    nodes: HashMap<NodeId, Node>,
    /// Insertion order, for deterministic iteration
    order: Vec<NodeId>,
    /// Per-class-tag counters backing unique ID generation
    counters: HashMap<String, u64>,
    /// Nesting depth of batch processing; per-node events are suppressed
    /// while this is non-zero
    batch_depth: u32,
    pending: VecDeque<SceneEvent>,
    mtime_counter: u64,
    /// Bumped on any transform-node change; world-transform caches are
    /// stamped against it
    transform_epoch: u64,
    closing: bool,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- node access -------------------------------------------------

    /// Looks up a node; a missing ID is "not present", never an error
    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// True if the ID resolves
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes in the scene
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Nodes of one kind, in insertion order
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes().filter(move |n| n.kind() == kind)
    }

    /// First camera node bound to the given layout name
    pub fn camera_by_layout(&self, layout_name: &str) -> Option<&CameraNode> {
        self.nodes()
            .filter_map(Node::as_camera)
            .find(|c| c.layout_name == layout_name)
    }

    /// First slice node with the given layout name
    pub fn slice_by_layout(&self, layout_name: &str) -> Option<&SliceNode> {
        self.nodes()
            .filter_map(Node::as_slice)
            .find(|s| s.layout_name == layout_name)
    }

    /// First 3D view node with the given layout name
    pub fn view_by_layout(&self, layout_name: &str) -> Option<&ViewNode> {
        self.nodes()
            .filter_map(Node::as_view)
            .find(|v| v.layout_name == layout_name)
    }

    /// The scene-wide clip configuration node, if present
    pub fn clip_node(&self) -> Option<&ClipNode> {
        self.nodes().filter_map(Node::as_clip).next()
    }

    // ---- mutation ----------------------------------------------------

    /// Adds a node, assigning a unique ID when the node carries none
    ///
    /// Queues `NodeAdded` unless batch processing suppresses it.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        if node.id().is_unset() {
            let id = self.generate_unique_id(node.kind());
            node.base_mut().id = id;
        } else {
            self.reserve_counter_past(node.id());
        }
        let id = node.id().clone();
        let stamp = self.next_mtime();
        node.base_mut().mtime = stamp;
        if let Node::Model(m) = &mut node {
            if std::mem::take(&mut m.mesh_touched) {
                m.mesh_mtime = stamp;
            }
        }
        if matches!(node, Node::Transform(_)) {
            self.transform_epoch += 1;
        }
        if self.nodes.insert(id.clone(), node).is_none() {
            self.order.push(id.clone());
        } else {
            warn!("add_node replaced existing node {id}");
        }
        self.queue_node_event(SceneEvent::NodeAdded(id.clone()));
        id
    }

    /// Removes a node, returning it by value
    ///
    /// References held elsewhere by ID simply stop resolving.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
        let node = self.nodes.remove(id)?;
        self.order.retain(|n| n != id);
        if matches!(node, Node::Transform(_)) {
            self.transform_epoch += 1;
        }
        self.queue_node_event(SceneEvent::NodeRemoved {
            id: id.clone(),
            kind: node.kind(),
        });
        Some(node)
    }

    /// Mutates a node in place, stamping it and queuing `NodeModified`
    ///
    /// Returns false when the ID does not resolve.
    pub fn modify(&mut self, id: &NodeId, f: impl FnOnce(&mut Node)) -> bool {
        let stamp = self.next_mtime();
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        f(node);
        node.base_mut().mtime = stamp;
        if let Node::Model(m) = node {
            if std::mem::take(&mut m.mesh_touched) {
                m.mesh_mtime = stamp;
            }
        }
        if matches!(node, Node::Transform(_)) {
            self.transform_epoch += 1;
        }
        self.queue_node_event(SceneEvent::NodeModified(id.clone()));
        true
    }

    /// Convenience: creates a model + display pair wired to each other
    pub fn add_model_with_display(
        &mut self,
        model: super::model::ModelNode,
        mut display: super::display::ModelDisplayNode,
    ) -> (NodeId, NodeId) {
        let model_id = self.add_node(Node::Model(model));
        display.displayable_id = Some(model_id.clone());
        let display_id = self.add_node(Node::ModelDisplay(display));
        self.modify(&model_id, |n| {
            if let Some(m) = n.as_model_mut() {
                m.add_display_id(display_id.clone());
            }
        });
        (model_id, display_id)
    }

    /// Empties the scene, emitting `SceneClosing`/`SceneClosed` instead of
    /// per-node removal events
    pub fn clear(&mut self) {
        self.pending.push_back(SceneEvent::SceneClosing);
        self.closing = true;
        self.nodes.clear();
        self.order.clear();
        self.pending.push_back(SceneEvent::SceneClosed);
    }

    /// True from `clear()` until the queued `SceneClosed` is drained
    pub fn is_closing(&self) -> bool {
        self.closing
    }

    // ---- batch processing ----------------------------------------------

    /// Enters batch processing; nests
    pub fn begin_batch(&mut self) {
        if self.batch_depth == 0 {
            self.pending.push_back(SceneEvent::BatchProcessingStarted);
        }
        self.batch_depth += 1;
    }

    /// Leaves batch processing; the outermost end queues a single
    /// `BatchProcessingEnded`
    pub fn end_batch(&mut self) {
        debug_assert!(self.batch_depth > 0, "end_batch without begin_batch");
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 {
            self.pending.push_back(SceneEvent::BatchProcessingEnded);
        }
    }

    /// True while bulk load/import suppresses per-node events
    pub fn is_batch_processing(&self) -> bool {
        self.batch_depth > 0
    }

    // ---- events ----------------------------------------------------------

    /// Queues a secondary event (used by managers, e.g. camera rebinds)
    pub fn push_event(&mut self, event: SceneEvent) {
        self.pending.push_back(event);
    }

    /// Pops the next pending event, oldest first
    pub fn pop_event(&mut self) -> Option<SceneEvent> {
        let event = self.pending.pop_front();
        if matches!(event, Some(SceneEvent::SceneClosed)) {
            self.closing = false;
        }
        event
    }

    /// Number of queued events
    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    fn queue_node_event(&mut self, event: SceneEvent) {
        if self.batch_depth > 0 {
            return;
        }
        self.pending.push_back(event);
    }

    // ---- stamps and IDs ----------------------------------------------

    fn next_mtime(&mut self) -> u64 {
        self.mtime_counter += 1;
        self.mtime_counter
    }

    /// Current transform epoch; bumped on any transform-node change
    pub fn transform_epoch(&self) -> u64 {
        self.transform_epoch
    }

    fn generate_unique_id(&mut self, kind: NodeKind) -> NodeId {
        let tag = kind.class_tag();
        let counter = self.counters.entry(tag.to_string()).or_insert(0);
        *counter += 1;
        NodeId::new(format!("{tag}{counter}"))
    }

    /// Keeps the class counter ahead of an externally supplied ID so a
    /// later generated ID can never collide with it
    fn reserve_counter_past(&mut self, id: &NodeId) {
        let s = id.as_str();
        let split = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
        let (tag, num) = s.split_at(split);
        if let Ok(n) = num.parse::<u64>() {
            let counter = self.counters.entry(tag.to_string()).or_insert(0);
            *counter = (*counter).max(n);
        }
    }

    // ---- transforms ---------------------------------------------------

    /// Composition of the node's parent-transform chain to world
    pub fn transform_to_world(&self, id: &NodeId) -> WorldTransform {
        let Some(node) = self.nodes.get(id) else {
            return WorldTransform::Identity;
        };
        match &node.base().parent_transform {
            Some(parent) => self.transform_node_to_world(parent, 0),
            None => WorldTransform::Identity,
        }
    }

    fn transform_node_to_world(&self, id: &NodeId, depth: u32) -> WorldTransform {
        // A cycle in the chain is a wiring bug; degrade to identity rather
        // than hang.
        if depth > 64 {
            warn!("transform chain through {id} exceeds depth limit, assuming cycle");
            return WorldTransform::Identity;
        }
        let Some(t) = self.nodes.get(id).and_then(Node::as_transform) else {
            // Unresolvable reference: treated as not present.
            return WorldTransform::Identity;
        };
        if let Some(cache) = t.world_cache.borrow().as_ref() {
            if cache.epoch == self.transform_epoch {
                return cache.world.clone();
            }
        }
        let world = match t.parent() {
            None => WorldTransform::compose(vec![t.transform.clone()]),
            Some(parent) => {
                match self.transform_node_to_world(parent, depth + 1) {
                    WorldTransform::Identity => WorldTransform::compose(vec![t.transform.clone()]),
                    WorldTransform::Linear(m) => {
                        if let Transform::Linear(inner) = &t.transform {
                            WorldTransform::Linear(m * *inner)
                        } else {
                            WorldTransform::General(vec![
                                t.transform.clone(),
                                Transform::Linear(m),
                            ])
                        }
                    }
                    WorldTransform::General(outer_stages) => {
                        let mut stages = Vec::with_capacity(outer_stages.len() + 1);
                        stages.push(t.transform.clone());
                        stages.extend(outer_stages);
                        WorldTransform::General(stages)
                    }
                }
            }
        };
        *t.world_cache.borrow_mut() = Some(WorldCache {
            epoch: self.transform_epoch,
            world: world.clone(),
        });
        world
    }

    // ---- folder hierarchy ------------------------------------------------

    /// Composed folder visibility and opacity along the parent-folder chain
    ///
    /// Visibility ANDs, opacity multiplies. Unresolvable folder references
    /// are skipped.
    pub fn folder_composition(&self, id: &NodeId) -> (bool, f32) {
        let mut visible = true;
        let mut opacity = 1.0;
        let mut current = self
            .nodes
            .get(id)
            .and_then(|n| n.base().parent_folder.clone());
        let mut depth = 0;
        while let Some(folder_id) = current {
            depth += 1;
            if depth > 64 {
                warn!("folder chain through {folder_id} exceeds depth limit, assuming cycle");
                break;
            }
            let Some(folder) = self.nodes.get(&folder_id).and_then(Node::as_folder) else {
                break;
            };
            visible &= folder.visibility;
            opacity *= folder.opacity;
            current = folder.base.parent_folder.clone();
        }
        (visible, opacity)
    }

    // ---- save / restore ----------------------------------------------

    /// Serializes the scene (nodes in order plus ID counters) to JSON
    pub fn to_json(&self) -> Result<String, SceneError> {
        let file = SceneFile {
            nodes: self.nodes().cloned().collect(),
            counters: self.counters.clone(),
        };
        Ok(serde_json::to_string(&file)?)
    }

    /// Imports a serialized scene into this one under batch processing
    ///
    /// Node IDs are preserved so layout-name and by-ID bindings reconnect.
    pub fn import_json(&mut self, json: &str) -> Result<(), SceneError> {
        let file: SceneFile = serde_json::from_str(json)?;
        for node in &file.nodes {
            if self.nodes.contains_key(node.id()) {
                return Err(SceneError::DuplicateId(node.id().clone()));
            }
        }
        self.begin_batch();
        for node in file.nodes {
            self.add_node(node);
        }
        for (tag, n) in file.counters {
            let counter = self.counters.entry(tag).or_insert(0);
            *counter = (*counter).max(n);
        }
        self.end_batch();
        Ok(())
    }

    /// Restores a scene from JSON into a fresh instance
    pub fn from_json(json: &str) -> Result<Scene, SceneError> {
        let mut scene = Scene::new();
        scene.import_json(json)?;
        Ok(scene)
    }
}
