//! Routes physical key events through the keymap.
//!
//! A press resolves against the active layers from the highest down, skipping
//! transparent bindings, and the binding it lands on is remembered so the
//! matching release reaches the same binding even if layers changed in
//! between. Key activations raised while handling an event are handed to the
//! [`ReleaseListener`] before the event is considered done.

use crate::actions::{is_builtin, Actions};
use crate::auto_hold::{AutoHold, AutoHoldConfig};
use crate::behavior::{ActionInvoker, Behavior, BehaviorError, ParameterMetadata};
use crate::binding::{Binding, BindingEvent, KeyActivation, Status};
use crate::config::Config;
use crate::ipc::InstanceStatus;
use crate::keymap::{parse_binding, Keymap};
use crate::listener::ReleaseListener;
use crate::registry::Registry;
use anyhow::Result;
use std::collections::HashMap;
use tracing::{error, info, trace};

#[derive(Debug)]
pub struct Pipeline {
    keymap: Keymap,
    actions: Actions,
    registry: Registry,
    listener: ReleaseListener,
    /// Position -> layer and binding its press resolved to.
    pressed: HashMap<u32, (u8, Binding)>,
}

impl Pipeline {
    pub fn new(keymap: Keymap, registry: Registry) -> Self {
        Self {
            actions: Actions::new(keymap.layer_count()),
            keymap,
            registry,
            listener: ReleaseListener::new(),
            pressed: HashMap::new(),
        }
    }

    /// Build the registry and keymap from configuration.
    ///
    /// An auto-hold instance whose wrapped binding cannot be resolved is
    /// logged and left out of the registry; bindings that name it fail at
    /// runtime instead of arming. Keymap errors are fatal.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Registry::with_capacity(config.general.max_instances);
        let mut wrapped = HashMap::new();

        for entry in &config.auto_holds {
            let binding = match parse_binding(&entry.bindings, &HashMap::new()) {
                Ok(b) => b,
                Err(e) => {
                    error!(instance = %entry.name, error = %format!("{:#}", e), "invalid auto-hold binding, instance not registered");
                    continue;
                }
            };
            if !is_builtin(&binding.behavior) {
                error!(instance = %entry.name, behavior = %binding.behavior, "wrapped behavior not found, instance not registered");
                continue;
            }
            if is_builtin(&entry.name) {
                error!(instance = %entry.name, "auto-hold name shadows a built-in behavior, instance not registered");
                continue;
            }

            let instance = AutoHold::new(
                entry.name.clone(),
                AutoHoldConfig {
                    binding: binding.clone(),
                    timeout_ms: entry.timeout_ms(&config.general),
                },
            );
            match registry.register(instance) {
                Ok(id) => {
                    info!(instance = %entry.name, index = id.index(), wraps = %binding, "auto-hold registered");
                    wrapped.insert(entry.name.clone(), binding);
                }
                Err(e) => error!(instance = %entry.name, error = %e, "auto-hold not registered"),
            }
        }

        let keymap = Keymap::from_config(config, &wrapped)?;
        Ok(Self::new(keymap, registry))
    }

    /// Handle a physical key press or release at `timestamp`.
    ///
    /// Timers due at or before `timestamp` fire first, so an event never
    /// overtakes a timeout that happened earlier.
    pub fn process(
        &mut self,
        position: u32,
        pressed: bool,
        timestamp: i64,
    ) -> Result<Status, BehaviorError> {
        self.registry.poll_timers(timestamp);
        let start = self.actions.raised().len();
        let result = if pressed {
            self.press(position, timestamp)
        } else {
            self.release(position, timestamp)
        };
        self.deliver_activations(start);
        result
    }

    fn press(&mut self, position: u32, timestamp: i64) -> Result<Status, BehaviorError> {
        let mut result = Ok(Status::Transparent);
        for layer in self.actions.layers().active_desc() {
            let binding = self.keymap.resolve(layer, position);
            let event = BindingEvent {
                position,
                layer,
                timestamp,
            };
            result = self.dispatch(&binding, event, true);
            if result != Ok(Status::Transparent) {
                trace!(position, layer, binding = %binding, "pressed");
                self.pressed.insert(position, (layer, binding));
                break;
            }
        }
        result
    }

    fn release(&mut self, position: u32, timestamp: i64) -> Result<Status, BehaviorError> {
        let Some((layer, binding)) = self.pressed.remove(&position) else {
            trace!(position, "release without a recorded press");
            return Ok(Status::Bubble);
        };
        let event = BindingEvent {
            position,
            layer,
            timestamp,
        };
        self.dispatch(&binding, event, false)
    }

    fn dispatch(
        &mut self,
        binding: &Binding,
        event: BindingEvent,
        pressed: bool,
    ) -> Result<Status, BehaviorError> {
        match self.registry.by_name_mut(&binding.behavior) {
            Some(instance) if pressed => instance.on_pressed(binding, event, &mut self.actions),
            Some(instance) => instance.on_released(binding, event, &mut self.actions),
            None => self.actions.invoke(binding, event, pressed),
        }
    }

    /// Feed activations raised since `start` to the release listener. Forced
    /// releases can raise more activations; those are delivered too.
    fn deliver_activations(&mut self, start: usize) {
        let mut idx = start;
        while let Some(activation) = self.actions.raised().get(idx).copied() {
            self.listener
                .on_key_activation(&activation, &mut self.registry, &mut self.actions);
            idx += 1;
        }
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.registry.next_deadline()
    }

    /// Fire due auto-hold timers. Returns how many instances became held.
    pub fn poll_timers(&mut self, now: i64) -> usize {
        self.registry.poll_timers(now)
    }

    /// Force-release every held instance, as an unrelated key press would.
    pub fn release_held(&mut self, now: i64) -> usize {
        self.registry.poll_timers(now);
        let start = self.actions.raised().len();
        let released = self
            .listener
            .release_held(&mut self.registry, &mut self.actions, now);
        self.deliver_activations(start);
        released
    }

    /// Key activations to emit, in the order they were raised.
    pub fn drain_keycodes(&mut self) -> Vec<KeyActivation> {
        self.actions.drain_raised()
    }

    pub fn active_layers(&self) -> Vec<u8> {
        self.actions.layers().active_desc()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn released_total(&self) -> u64 {
        self.listener.released_total()
    }

    pub fn snapshot(&self) -> Vec<InstanceStatus> {
        self.registry
            .iter()
            .map(|i| InstanceStatus {
                name: i.name().to_string(),
                phase: i.phase(),
                position: i.position(),
                timeout_ms: i.config().timeout_ms,
            })
            .collect()
    }

    /// Parameters accepted by an auto-hold instance or built-in behavior.
    pub fn parameter_metadata(&self, behavior: &str) -> Result<ParameterMetadata, BehaviorError> {
        match self.registry.find(behavior).and_then(|id| self.registry.get(id)) {
            Some(instance) => instance.parameter_metadata(&self.actions),
            None => self.actions.parameter_metadata(behavior),
        }
    }
}
