//! Fakes shared by the unit tests of this crate.

use crate::behavior::{ActionInvoker, BehaviorError, ParameterMetadata};
use crate::binding::{Binding, BindingEvent, Status};

/// One call made through [`RecordingInvoker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation {
    pub binding: Binding,
    pub event: BindingEvent,
    pub pressed: bool,
}

/// Invoker that records every call and answers with a canned result.
#[derive(Debug, Default)]
pub(crate) struct RecordingInvoker {
    pub calls: Vec<Invocation>,
    pub fail_with: Option<BehaviorError>,
    pub metadata: Option<ParameterMetadata>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presses(&self) -> Vec<&Invocation> {
        self.calls.iter().filter(|c| c.pressed).collect()
    }

    pub fn releases(&self) -> Vec<&Invocation> {
        self.calls.iter().filter(|c| !c.pressed).collect()
    }
}

impl ActionInvoker for RecordingInvoker {
    fn invoke(
        &mut self,
        binding: &Binding,
        event: BindingEvent,
        pressed: bool,
    ) -> Result<Status, BehaviorError> {
        self.calls.push(Invocation {
            binding: binding.clone(),
            event,
            pressed,
        });
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(Status::Bubble),
        }
    }

    fn parameter_metadata(&self, behavior: &str) -> Result<ParameterMetadata, BehaviorError> {
        self.metadata
            .clone()
            .ok_or_else(|| BehaviorError::NoMetadata(behavior.to_string()))
    }
}

pub(crate) fn event(position: u32, layer: u8, timestamp: i64) -> BindingEvent {
    BindingEvent {
        position,
        layer,
        timestamp,
    }
}
