//! Interaction events and the view interactor style
//!
//! The interactor style translates raw device events into semantic
//! interaction events (press, drag, release, scroll) and forwards them to
//! the manager group's priority-ranked dispatch. Camera manipulation is not
//! handled here; the camera manager claims unclaimed events at the reserved
//! lowest priority.

use glam::Vec2;

/// Mouse button of a press/drag/release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Keyboard modifiers held during an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

/// Raw device event as delivered by the view widget host
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    ButtonPress {
        button: MouseButton,
        position: Vec2,
        modifiers: Modifiers,
    },
    Move {
        position: Vec2,
        modifiers: Modifiers,
    },
    ButtonRelease {
        button: MouseButton,
        position: Vec2,
        modifiers: Modifiers,
    },
    Scroll {
        delta: f32,
        position: Vec2,
    },
    KeyPress {
        key: char,
    },
}

/// Semantic interaction event dispatched to managers
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    Press {
        button: MouseButton,
        position: Vec2,
        modifiers: Modifiers,
    },
    /// Pointer moved while a button is held
    Drag {
        button: MouseButton,
        from: Vec2,
        to: Vec2,
        modifiers: Modifiers,
    },
    /// Pointer moved with no button held
    Hover {
        position: Vec2,
    },
    Release {
        button: MouseButton,
        position: Vec2,
    },
    Scroll {
        delta: f32,
        position: Vec2,
    },
    Key {
        key: char,
    },
}

impl InteractionEvent {
    /// Screen position of the event, if it has one
    pub fn position(&self) -> Option<Vec2> {
        match self {
            InteractionEvent::Press { position, .. }
            | InteractionEvent::Hover { position }
            | InteractionEvent::Release { position, .. }
            | InteractionEvent::Scroll { position, .. } => Some(*position),
            InteractionEvent::Drag { to, .. } => Some(*to),
            InteractionEvent::Key { .. } => None,
        }
    }

    /// True for events that start an exclusive interaction
    pub fn begins_interaction(&self) -> bool {
        matches!(self, InteractionEvent::Press { .. })
    }

    /// True for events that end an exclusive interaction
    pub fn ends_interaction(&self) -> bool {
        matches!(self, InteractionEvent::Release { .. })
    }
}

/// Translates device events into semantic interaction events
///
/// Tracks which button is held so moves become drags with a from/to pair.
#[derive(Debug, Default)]
pub struct ViewInteractorStyle {
    active_button: Option<MouseButton>,
    last_position: Vec2,
}

impl ViewInteractorStyle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts one device event; returns None for events that translate to
    /// nothing (e.g. a release with no tracked press)
    pub fn translate(&mut self, event: &DeviceEvent) -> Option<InteractionEvent> {
        match event {
            DeviceEvent::ButtonPress {
                button,
                position,
                modifiers,
            } => {
                self.active_button = Some(*button);
                self.last_position = *position;
                Some(InteractionEvent::Press {
                    button: *button,
                    position: *position,
                    modifiers: *modifiers,
                })
            }
            DeviceEvent::Move {
                position,
                modifiers,
            } => {
                let from = self.last_position;
                self.last_position = *position;
                match self.active_button {
                    Some(button) => Some(InteractionEvent::Drag {
                        button,
                        from,
                        to: *position,
                        modifiers: *modifiers,
                    }),
                    None => Some(InteractionEvent::Hover {
                        position: *position,
                    }),
                }
            }
            DeviceEvent::ButtonRelease {
                button, position, ..
            } => {
                if self.active_button != Some(*button) {
                    return None;
                }
                self.active_button = None;
                self.last_position = *position;
                Some(InteractionEvent::Release {
                    button: *button,
                    position: *position,
                })
            }
            DeviceEvent::Scroll { delta, position } => Some(InteractionEvent::Scroll {
                delta: *delta,
                position: *position,
            }),
            DeviceEvent::KeyPress { key } => Some(InteractionEvent::Key { key: *key }),
        }
    }
}
