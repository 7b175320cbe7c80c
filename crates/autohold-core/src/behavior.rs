use crate::binding::{Binding, BindingEvent, Status};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by behaviors and the actions they invoke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BehaviorError {
    /// No behavior with this name is known.
    #[error("behavior '{0}' is not registered")]
    Unresolved(String),

    /// The behavior exists but rejected one of its parameters.
    #[error("invalid parameter for '{behavior}': {reason}")]
    InvalidParameter { behavior: String, reason: String },

    /// The behavior does not describe its parameters.
    #[error("behavior '{0}' has no parameter metadata")]
    NoMetadata(String),
}

/// One accepted value (or family of values) for a behavior parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamValue {
    /// A named constant.
    Value { name: String, value: u32 },
    /// Any integer in `min..=max`.
    Range { min: u32, max: u32 },
    /// A HID keyboard usage (key name or code).
    HidUsage,
    /// A keymap layer index.
    LayerId,
}

/// A combination of param1/param2 values that go together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub param1: Vec<ParamValue>,
    pub param2: Vec<ParamValue>,
}

/// Parameters accepted by a behavior, for validation and UI tooling only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterMetadata {
    pub sets: Vec<ParameterSet>,
}

/// Executes the press or release side effect of a wrapped action.
pub trait ActionInvoker {
    fn invoke(
        &mut self,
        binding: &Binding,
        event: BindingEvent,
        pressed: bool,
    ) -> Result<Status, BehaviorError>;

    fn parameter_metadata(&self, behavior: &str) -> Result<ParameterMetadata, BehaviorError>;
}

/// A configurable behavior that bindings in the keymap can point at.
pub trait Behavior {
    fn on_pressed(
        &mut self,
        binding: &Binding,
        event: BindingEvent,
        invoker: &mut dyn ActionInvoker,
    ) -> Result<Status, BehaviorError>;

    fn on_released(
        &mut self,
        binding: &Binding,
        event: BindingEvent,
        invoker: &mut dyn ActionInvoker,
    ) -> Result<Status, BehaviorError>;

    fn parameter_metadata(
        &self,
        invoker: &dyn ActionInvoker,
    ) -> Result<ParameterMetadata, BehaviorError>;
}
