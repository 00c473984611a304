//! Event records captured by the input listeners.
//!
//! Records carry timing and event kind only - never key codes, characters
//! or pointer coordinates.

use serde::{Deserialize, Serialize};

/// Which input source a listener or buffer serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Keyboard,
    Pointer,
}

impl InputSource {
    pub fn name(&self) -> &'static str {
        match self {
            InputSource::Keyboard => "keyboard",
            InputSource::Pointer => "pointer",
        }
    }
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Event kind classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Key pressed
    Press,
    /// Key released
    Release,
    /// Pointer movement
    Move,
    /// Pointer button pressed or released
    Click,
}

/// Pointer button involved in a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
    Other,
}

/// Button details attached to click records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickDetail {
    pub button: PointerButton,
    pub pressed: bool,
}

/// A single timestamped input event. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unix seconds
    pub timestamp: f64,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ClickDetail>,
}

impl EventRecord {
    pub fn press(timestamp: f64) -> Self {
        Self {
            timestamp,
            kind: EventKind::Press,
            extra: None,
        }
    }

    pub fn release(timestamp: f64) -> Self {
        Self {
            timestamp,
            kind: EventKind::Release,
            extra: None,
        }
    }

    pub fn movement(timestamp: f64) -> Self {
        Self {
            timestamp,
            kind: EventKind::Move,
            extra: None,
        }
    }

    pub fn click(timestamp: f64, button: PointerButton, pressed: bool) -> Self {
        Self {
            timestamp,
            kind: EventKind::Click,
            extra: Some(ClickDetail { button, pressed }),
        }
    }

    /// The source this kind of event belongs to.
    pub fn source(&self) -> InputSource {
        match self.kind {
            EventKind::Press | EventKind::Release => InputSource::Keyboard,
            EventKind::Move | EventKind::Click => InputSource::Pointer,
        }
    }
}
