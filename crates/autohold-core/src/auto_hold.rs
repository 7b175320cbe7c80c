//! The auto-hold behavior.
//!
//! Pressing an auto-hold binding presses the wrapped action right away and
//! arms a timer. Releasing before the timer fires releases the wrapped action
//! as usual. Once the timer fires the instance is held: the physical release
//! is absorbed and the wrapped action stays active until the same binding is
//! pressed again or [`ReleaseListener`](crate::listener::ReleaseListener)
//! sees an unrelated key press.

use crate::behavior::{ActionInvoker, Behavior, BehaviorError, ParameterMetadata, ParameterSet};
use crate::binding::{Binding, BindingEvent, Status};
use crate::timer::OneShot;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Static configuration of one auto-hold instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoHoldConfig {
    /// Wrapped behavior. Its params are defaults for keymap bindings that omit them.
    pub binding: Binding,
    pub timeout_ms: u64,
}

/// What was pressed, captured when the instance armed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Capture {
    position: u32,
    press_timestamp: i64,
    binding: Binding,
    held_layer: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Idle,
    /// Pressed; the timer is pending.
    Armed(Capture),
    /// Timer fired; releases are absorbed.
    Held(Capture),
}

/// Externally visible state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Armed,
    Held,
}

#[derive(Debug)]
pub struct AutoHold {
    name: String,
    config: AutoHoldConfig,
    state: State,
    timer: OneShot,
}

impl AutoHold {
    pub fn new(name: impl Into<String>, config: AutoHoldConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: State::Idle,
            timer: OneShot::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &AutoHoldConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::Armed(_) => Phase::Armed,
            State::Held(_) => Phase::Held,
        }
    }

    pub fn is_held(&self) -> bool {
        matches!(self.state, State::Held(_))
    }

    /// Position that started the current cycle, if any.
    pub fn position(&self) -> Option<u32> {
        match &self.state {
            State::Armed(c) | State::Held(c) => Some(c.position),
            State::Idle => None,
        }
    }

    pub fn press_timestamp(&self) -> Option<i64> {
        match &self.state {
            State::Armed(c) | State::Held(c) => Some(c.press_timestamp),
            State::Idle => None,
        }
    }

    /// When the pending timer expires, or `None` if no timer is pending.
    pub fn next_deadline(&self) -> Option<i64> {
        self.timer.deadline()
    }

    /// Fire the timer if it is due. Returns true when the instance became held.
    pub fn poll_timer(&mut self, now: i64) -> bool {
        if !self.timer.fire(now) {
            return false;
        }
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Armed(capture) => {
                debug!(instance = %self.name, position = capture.position, "auto-hold activated");
                self.state = State::Held(capture);
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Release a held instance on behalf of unrelated key activity.
    ///
    /// The wrapped release runs with the captured binding, position and
    /// layer. Its status is not reported; errors are only logged. Returns
    /// false if the instance was not held.
    pub fn force_release(&mut self, now: i64, invoker: &mut dyn ActionInvoker) -> bool {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Held(capture) => {
                self.timer.cancel();
                debug!(instance = %self.name, position = capture.position, "releasing auto-held key");
                let event = BindingEvent {
                    position: capture.position,
                    layer: capture.held_layer,
                    timestamp: now,
                };
                if let Err(e) = invoker.invoke(&capture.binding, event, false) {
                    warn!(instance = %self.name, error = %e, "forced release failed");
                }
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    fn wrap(&self, binding: &Binding) -> Binding {
        binding.retarget(&self.config.binding.behavior)
    }
}

impl Behavior for AutoHold {
    fn on_pressed(
        &mut self,
        binding: &Binding,
        event: BindingEvent,
        invoker: &mut dyn ActionInvoker,
    ) -> Result<Status, BehaviorError> {
        let wrapped = self.wrap(binding);

        match &self.state {
            State::Held(_) => {
                self.timer.cancel();
                self.state = State::Idle;
                debug!(instance = %self.name, position = event.position, "auto-hold released by re-press");
                return invoker.invoke(&wrapped, event, false);
            }
            State::Armed(previous) => {
                self.timer.cancel();
                debug!(
                    instance = %self.name,
                    previous = previous.position,
                    position = event.position,
                    "pressed again before timeout, re-arming"
                );
            }
            State::Idle => {}
        }

        self.timer.schedule(event.timestamp, self.config.timeout_ms);
        self.state = State::Armed(Capture {
            position: event.position,
            press_timestamp: event.timestamp,
            binding: wrapped.clone(),
            held_layer: event.layer,
        });
        debug!(
            instance = %self.name,
            position = event.position,
            timeout_ms = self.config.timeout_ms,
            "waiting for timeout to start auto-hold"
        );
        invoker.invoke(&wrapped, event, true)
    }

    fn on_released(
        &mut self,
        binding: &Binding,
        event: BindingEvent,
        invoker: &mut dyn ActionInvoker,
    ) -> Result<Status, BehaviorError> {
        self.timer.cancel();
        match &self.state {
            State::Held(capture) => {
                debug!(instance = %self.name, position = capture.position, "auto-hold active, not releasing");
                Ok(Status::Opaque)
            }
            State::Armed(_) => {
                self.state = State::Idle;
                invoker.invoke(&self.wrap(binding), event, false)
            }
            State::Idle => {
                trace!(instance = %self.name, position = event.position, "release while idle ignored");
                Ok(Status::Bubble)
            }
        }
    }

    fn parameter_metadata(
        &self,
        invoker: &dyn ActionInvoker,
    ) -> Result<ParameterMetadata, BehaviorError> {
        let child = invoker
            .parameter_metadata(&self.config.binding.behavior)
            .inspect_err(|e| warn!(instance = %self.name, error = %e, "failed to get the wrapped behavior parameters"))?;

        let param1 = child
            .sets
            .first()
            .map(|set| set.param1.clone())
            .unwrap_or_default();
        Ok(ParameterMetadata {
            sets: vec![ParameterSet {
                param1,
                param2: Vec::new(),
            }],
        })
    }
}
