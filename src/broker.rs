//! Event broker: the observation registry between scene and managers
//!
//! The broker is an explicitly constructed value owned by the application
//! session and handed by reference into dispatch — there is no global
//! instance. It stores (subject, event-kind, observer) observations and
//! answers, per drained scene event, which observers want it. It never
//! stores callbacks; dispatch calls the observer's typed handler with the
//! tagged event.

use log::debug;

use crate::dmml::{EventKind, NodeId, SceneEvent};

/// Identity of one observing manager, allocated by the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// What an observation listens to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// Events of the kind from any node (or scene-wide events)
    Scene,
    /// Events of the kind from one specific node
    Node(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Observation {
    subject: Subject,
    kind: EventKind,
    observer: ObserverId,
}

/// Process-wide observation registry, explicitly owned and injected
#[derive(Debug, Default)]
pub struct EventBroker {
    observations: Vec<Observation>,
    next_observer: u64,
}

impl EventBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a unique observer identity
    pub fn register_observer(&mut self) -> ObserverId {
        self.next_observer += 1;
        ObserverId(self.next_observer)
    }

    /// Registers an observation; at most one per exact tuple
    ///
    /// Returns false when the identical observation already existed, in
    /// which case nothing is added — a second registration can never cause
    /// a second callback per event.
    pub fn add_observation(
        &mut self,
        subject: Subject,
        kind: EventKind,
        observer: ObserverId,
    ) -> bool {
        if self.observation_exists(&subject, kind, observer) {
            debug!("observation ({subject:?}, {kind:?}) already registered");
            return false;
        }
        self.observations.push(Observation {
            subject,
            kind,
            observer,
        });
        true
    }

    /// True if the exact observation tuple is registered
    pub fn observation_exists(
        &self,
        subject: &Subject,
        kind: EventKind,
        observer: ObserverId,
    ) -> bool {
        self.observations
            .iter()
            .any(|o| o.observer == observer && o.kind == kind && &o.subject == subject)
    }

    /// Bulk-removes this observer's observations matching the filters
    ///
    /// `None` filters match everything; safe to call for subjects that no
    /// longer resolve in the scene.
    pub fn remove_observations(
        &mut self,
        observer: ObserverId,
        subject: Option<&Subject>,
        kind: Option<EventKind>,
    ) -> usize {
        let before = self.observations.len();
        self.observations.retain(|o| {
            !(o.observer == observer
                && subject.map_or(true, |s| &o.subject == s)
                && kind.map_or(true, |k| o.kind == k))
        });
        before - self.observations.len()
    }

    /// Removes every observation of a subject node, for any observer
    ///
    /// Used when the node is destroyed.
    pub fn remove_subject(&mut self, id: &NodeId) -> usize {
        let before = self.observations.len();
        self.observations
            .retain(|o| !matches!(&o.subject, Subject::Node(n) if n == id));
        before - self.observations.len()
    }

    /// True if the observer has any observation matching this event
    ///
    /// A `Subject::Scene` observation of the kind matches any subject; a
    /// `Subject::Node` observation matches only its node.
    pub fn wants(&self, observer: ObserverId, event: &SceneEvent) -> bool {
        let kind = event.kind();
        self.observations.iter().any(|o| {
            o.observer == observer
                && o.kind == kind
                && match &o.subject {
                    Subject::Scene => true,
                    Subject::Node(id) => event.subject() == Some(id),
                }
        })
    }

    /// Number of registered observations
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_observation_is_idempotent() {
        let mut broker = EventBroker::new();
        let observer = broker.register_observer();
        assert!(broker.add_observation(Subject::Scene, EventKind::NodeAdded, observer));
        assert!(!broker.add_observation(Subject::Scene, EventKind::NodeAdded, observer));
        assert_eq!(broker.len(), 1);

        // One registration, one match — never two dispatches per event.
        let event = SceneEvent::NodeAdded(NodeId::new("Model1"));
        let matches = broker
            .observations
            .iter()
            .filter(|o| o.observer == observer && o.kind == event.kind())
            .count();
        assert_eq!(matches, 1);
    }

    #[test]
    fn test_node_scoped_observation_filters_subject() {
        let mut broker = EventBroker::new();
        let observer = broker.register_observer();
        let camera = NodeId::new("Camera1");
        broker.add_observation(
            Subject::Node(camera.clone()),
            EventKind::NodeModified,
            observer,
        );
        assert!(broker.wants(observer, &SceneEvent::NodeModified(camera)));
        assert!(!broker.wants(observer, &SceneEvent::NodeModified(NodeId::new("Camera2"))));
    }

    #[test]
    fn test_scene_scoped_observation_matches_any_subject() {
        let mut broker = EventBroker::new();
        let observer = broker.register_observer();
        broker.add_observation(Subject::Scene, EventKind::NodeModified, observer);
        assert!(broker.wants(observer, &SceneEvent::NodeModified(NodeId::new("Model9"))));
    }

    #[test]
    fn test_remove_observations_filters() {
        let mut broker = EventBroker::new();
        let a = broker.register_observer();
        let b = broker.register_observer();
        broker.add_observation(Subject::Scene, EventKind::NodeAdded, a);
        broker.add_observation(Subject::Scene, EventKind::NodeRemoved, a);
        broker.add_observation(Subject::Scene, EventKind::NodeAdded, b);

        let removed = broker.remove_observations(a, None, Some(EventKind::NodeAdded));
        assert_eq!(removed, 1);
        // Other observers and kinds are untouched.
        assert!(broker.observation_exists(&Subject::Scene, EventKind::NodeRemoved, a));
        assert!(broker.observation_exists(&Subject::Scene, EventKind::NodeAdded, b));

        let removed = broker.remove_observations(a, None, None);
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_remove_subject_after_node_destruction() {
        let mut broker = EventBroker::new();
        let a = broker.register_observer();
        let b = broker.register_observer();
        let gone = NodeId::new("Camera1");
        broker.add_observation(Subject::Node(gone.clone()), EventKind::NodeModified, a);
        broker.add_observation(Subject::Node(gone.clone()), EventKind::NodeModified, b);
        broker.add_observation(Subject::Scene, EventKind::NodeModified, a);
        assert_eq!(broker.remove_subject(&gone), 2);
        assert_eq!(broker.len(), 1);
    }
}
