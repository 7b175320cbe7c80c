use serde::{Deserialize, Serialize};
use std::fmt;

/// A behavior name plus the two parameters it is invoked with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub behavior: String,
    pub param1: u32,
    pub param2: u32,
}

impl Binding {
    pub fn new(behavior: impl Into<String>, param1: u32, param2: u32) -> Self {
        Self {
            behavior: behavior.into(),
            param1,
            param2,
        }
    }

    /// Same params, different target behavior.
    pub fn retarget(&self, behavior: &str) -> Self {
        Self {
            behavior: behavior.to_string(),
            param1: self.param1,
            param2: self.param2,
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{} {} {}", self.behavior, self.param1, self.param2)
    }
}

/// Where and when a binding was pressed or released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingEvent {
    /// Physical key slot (evdev key code).
    pub position: u32,
    /// Layer the binding was resolved on.
    pub layer: u8,
    /// Milliseconds of process uptime.
    pub timestamp: i64,
}

/// A keycode changing state, raised by key-press actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyActivation {
    pub keycode: u16,
    pub pressed: bool,
    pub timestamp: i64,
}

/// Outcome of handling a binding event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Handled; the event keeps propagating.
    Bubble,
    /// Handled and absorbed.
    Opaque,
    /// Not handled here; the next lower layer should be tried.
    Transparent,
}
