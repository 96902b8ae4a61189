//! Tagged scene-event union
//!
//! Every payload is carried in the variant itself; observers match on the
//! variant instead of casting an untyped pointer by convention.

use serde::{Deserialize, Serialize};

use super::node::{NodeId, NodeKind};

/// Event emitted by scene mutation or by managers (secondary events)
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// A node entered the scene
    NodeAdded(NodeId),
    /// A node left the scene; the node itself is already gone, so the kind
    /// travels with the event
    NodeRemoved { id: NodeId, kind: NodeKind },
    /// A node was mutated in place
    NodeModified(NodeId),
    /// Bulk load/import started; per-node events are suppressed until it ends
    BatchProcessingStarted,
    /// Bulk load/import finished; deferred structural rebuilds run now
    BatchProcessingEnded,
    /// Scene teardown started; heavy recompute should be suppressed
    SceneClosing,
    /// Scene teardown finished; all per-scene state must be dropped
    SceneClosed,
    /// A 3D view rebound to a different camera node
    ActiveCameraChanged { view: NodeId, camera: NodeId },
}

/// Discriminant of `SceneEvent`, used as the observation filter key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    NodeAdded,
    NodeRemoved,
    NodeModified,
    BatchProcessingStarted,
    BatchProcessingEnded,
    SceneClosing,
    SceneClosed,
    ActiveCameraChanged,
}

impl SceneEvent {
    /// Discriminant of this event
    pub fn kind(&self) -> EventKind {
        match self {
            SceneEvent::NodeAdded(_) => EventKind::NodeAdded,
            SceneEvent::NodeRemoved { .. } => EventKind::NodeRemoved,
            SceneEvent::NodeModified(_) => EventKind::NodeModified,
            SceneEvent::BatchProcessingStarted => EventKind::BatchProcessingStarted,
            SceneEvent::BatchProcessingEnded => EventKind::BatchProcessingEnded,
            SceneEvent::SceneClosing => EventKind::SceneClosing,
            SceneEvent::SceneClosed => EventKind::SceneClosed,
            SceneEvent::ActiveCameraChanged { .. } => EventKind::ActiveCameraChanged,
        }
    }

    /// The node this event is about, if it is node-scoped
    pub fn subject(&self) -> Option<&NodeId> {
        match self {
            SceneEvent::NodeAdded(id) => Some(id),
            SceneEvent::NodeRemoved { id, .. } => Some(id),
            SceneEvent::NodeModified(id) => Some(id),
            SceneEvent::ActiveCameraChanged { camera, .. } => Some(camera),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_subject() {
        let id = NodeId::new("Model1");
        let event = SceneEvent::NodeModified(id.clone());
        assert_eq!(event.kind(), EventKind::NodeModified);
        assert_eq!(event.subject(), Some(&id));
        assert_eq!(SceneEvent::BatchProcessingEnded.subject(), None);
    }
}
