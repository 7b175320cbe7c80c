//! Built-in actions an auto-hold binding (or a plain keymap binding) can invoke.

use crate::behavior::{ActionInvoker, BehaviorError, ParamValue, ParameterMetadata, ParameterSet};
use crate::binding::{Binding, BindingEvent, KeyActivation, Status};
use crate::keycodes::MAX_KEYCODE;
use tracing::trace;

pub const KEY_PRESS: &str = "kp";
pub const MOMENTARY_LAYER: &str = "mo";
pub const TOGGLE_LAYER: &str = "tog";
pub const TRANSPARENT: &str = "trans";
pub const NONE: &str = "none";

/// Upper bound on keymap layers (one bit each).
pub const MAX_LAYERS: usize = 32;

pub fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        KEY_PRESS | MOMENTARY_LAYER | TOGGLE_LAYER | TRANSPARENT | NONE
    )
}

/// Active layers as a bitmask. Layer 0 is always active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerState {
    active: u32,
    count: usize,
}

impl LayerState {
    pub fn new(count: usize) -> Self {
        Self {
            active: 1,
            count: count.clamp(1, MAX_LAYERS),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_active(&self, layer: u8) -> bool {
        usize::from(layer) < self.count && self.active & (1 << layer) != 0
    }

    pub fn activate(&mut self, layer: u8) {
        if usize::from(layer) < self.count {
            self.active |= 1 << layer;
        }
    }

    pub fn deactivate(&mut self, layer: u8) {
        if layer != 0 && usize::from(layer) < self.count {
            self.active &= !(1 << layer);
        }
    }

    pub fn toggle(&mut self, layer: u8) {
        if self.is_active(layer) {
            self.deactivate(layer);
        } else {
            self.activate(layer);
        }
    }

    /// Active layers, highest first.
    pub fn active_desc(&self) -> Vec<u8> {
        (0..self.count as u8).rev().filter(|l| self.is_active(*l)).collect()
    }

    fn check(&self, behavior: &str, layer: u32) -> Result<u8, BehaviorError> {
        match u8::try_from(layer) {
            Ok(l) if usize::from(l) < self.count => Ok(l),
            _ => Err(BehaviorError::InvalidParameter {
                behavior: behavior.to_string(),
                reason: format!("layer {} out of range (0..{})", layer, self.count),
            }),
        }
    }
}

/// The built-in action invoker: owns layer state and collects raised key activations.
#[derive(Debug, Clone)]
pub struct Actions {
    layers: LayerState,
    raised: Vec<KeyActivation>,
}

impl Actions {
    pub fn new(layer_count: usize) -> Self {
        Self {
            layers: LayerState::new(layer_count),
            raised: Vec::new(),
        }
    }

    pub fn layers(&self) -> &LayerState {
        &self.layers
    }

    /// Key activations raised since the last drain.
    pub fn raised(&self) -> &[KeyActivation] {
        &self.raised
    }

    pub fn drain_raised(&mut self) -> Vec<KeyActivation> {
        std::mem::take(&mut self.raised)
    }

    fn key_press(
        &mut self,
        binding: &Binding,
        event: BindingEvent,
        pressed: bool,
    ) -> Result<Status, BehaviorError> {
        let keycode = u16::try_from(binding.param1)
            .ok()
            .filter(|c| (1..=MAX_KEYCODE).contains(c))
            .ok_or_else(|| BehaviorError::InvalidParameter {
                behavior: binding.behavior.clone(),
                reason: format!("keycode {} out of range", binding.param1),
            })?;
        trace!(keycode, pressed, "key activation");
        self.raised.push(KeyActivation {
            keycode,
            pressed,
            timestamp: event.timestamp,
        });
        Ok(Status::Bubble)
    }
}

impl ActionInvoker for Actions {
    fn invoke(
        &mut self,
        binding: &Binding,
        event: BindingEvent,
        pressed: bool,
    ) -> Result<Status, BehaviorError> {
        match binding.behavior.as_str() {
            KEY_PRESS => self.key_press(binding, event, pressed),
            MOMENTARY_LAYER => {
                let layer = self.layers.check(&binding.behavior, binding.param1)?;
                if pressed {
                    self.layers.activate(layer);
                } else {
                    self.layers.deactivate(layer);
                }
                trace!(layer, pressed, "momentary layer");
                Ok(Status::Opaque)
            }
            TOGGLE_LAYER => {
                let layer = self.layers.check(&binding.behavior, binding.param1)?;
                if pressed {
                    self.layers.toggle(layer);
                    trace!(layer, active = self.layers.is_active(layer), "toggle layer");
                }
                Ok(Status::Opaque)
            }
            TRANSPARENT => Ok(Status::Transparent),
            NONE => Ok(Status::Opaque),
            other => Err(BehaviorError::Unresolved(other.to_string())),
        }
    }

    fn parameter_metadata(&self, behavior: &str) -> Result<ParameterMetadata, BehaviorError> {
        let param1 = match behavior {
            KEY_PRESS => vec![ParamValue::HidUsage],
            MOMENTARY_LAYER | TOGGLE_LAYER => vec![ParamValue::LayerId],
            TRANSPARENT | NONE => Vec::new(),
            other => return Err(BehaviorError::Unresolved(other.to_string())),
        };
        Ok(ParameterMetadata {
            sets: vec![ParameterSet {
                param1,
                param2: Vec::new(),
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::event;

    #[test]
    fn layer_zero_is_always_active() {
        let mut layers = LayerState::new(3);
        assert_eq!(layers.active_desc(), vec![0]);
        layers.deactivate(0);
        layers.toggle(0);
        assert!(layers.is_active(0));
    }

    #[test]
    fn active_layers_are_listed_highest_first() {
        let mut layers = LayerState::new(4);
        layers.activate(1);
        layers.activate(3);
        assert_eq!(layers.active_desc(), vec![3, 1, 0]);
    }

    #[test]
    fn layer_count_is_clamped() {
        assert_eq!(LayerState::new(0).count(), 1);
        assert_eq!(LayerState::new(100).count(), MAX_LAYERS);
    }

    #[test]
    fn kp_raises_press_and_release() {
        let mut actions = Actions::new(1);
        let kp = Binding::new(KEY_PRESS, 30, 0);
        assert_eq!(actions.invoke(&kp, event(1, 0, 10), true), Ok(Status::Bubble));
        assert_eq!(actions.invoke(&kp, event(1, 0, 20), false), Ok(Status::Bubble));
        assert_eq!(
            actions.drain_raised(),
            vec![
                KeyActivation { keycode: 30, pressed: true, timestamp: 10 },
                KeyActivation { keycode: 30, pressed: false, timestamp: 20 },
            ]
        );
        assert!(actions.raised().is_empty());
    }

    #[test]
    fn kp_rejects_out_of_range_keycodes() {
        let mut actions = Actions::new(1);
        for code in [0, 256, 70_000] {
            let result = actions.invoke(&Binding::new(KEY_PRESS, code, 0), event(1, 0, 0), true);
            assert!(
                matches!(result, Err(BehaviorError::InvalidParameter { .. })),
                "keycode {} should be rejected",
                code
            );
        }
        assert!(actions.raised().is_empty());
    }

    #[test]
    fn mo_activates_while_pressed() {
        let mut actions = Actions::new(4);
        let mo = Binding::new(MOMENTARY_LAYER, 3, 0);
        assert_eq!(actions.invoke(&mo, event(1, 0, 0), true), Ok(Status::Opaque));
        assert!(actions.layers().is_active(3));
        actions.invoke(&mo, event(1, 0, 10), false).unwrap();
        assert!(!actions.layers().is_active(3));
    }

    #[test]
    fn mo_rejects_missing_layer() {
        let mut actions = Actions::new(2);
        let result = actions.invoke(&Binding::new(MOMENTARY_LAYER, 2, 0), event(1, 0, 0), true);
        assert!(matches!(result, Err(BehaviorError::InvalidParameter { .. })));
        assert_eq!(actions.layers().active_desc(), vec![0]);
    }

    #[test]
    fn tog_flips_on_press_only() {
        let mut actions = Actions::new(2);
        let tog = Binding::new(TOGGLE_LAYER, 1, 0);
        actions.invoke(&tog, event(1, 0, 0), true).unwrap();
        actions.invoke(&tog, event(1, 0, 5), false).unwrap();
        assert!(actions.layers().is_active(1));
        actions.invoke(&tog, event(1, 0, 10), true).unwrap();
        assert!(!actions.layers().is_active(1));
    }

    #[test]
    fn trans_and_none() {
        let mut actions = Actions::new(1);
        assert_eq!(
            actions.invoke(&Binding::new(TRANSPARENT, 0, 0), event(1, 0, 0), true),
            Ok(Status::Transparent)
        );
        assert_eq!(
            actions.invoke(&Binding::new(NONE, 0, 0), event(1, 0, 0), true),
            Ok(Status::Opaque)
        );
    }

    #[test]
    fn unknown_behavior_is_unresolved() {
        let mut actions = Actions::new(1);
        assert_eq!(
            actions.invoke(&Binding::new("bogus", 0, 0), event(1, 0, 0), true),
            Err(BehaviorError::Unresolved("bogus".into()))
        );
        assert_eq!(
            actions.parameter_metadata("bogus"),
            Err(BehaviorError::Unresolved("bogus".into()))
        );
    }

    #[test]
    fn metadata_describes_param1() {
        let actions = Actions::new(1);
        assert_eq!(
            actions.parameter_metadata(KEY_PRESS).unwrap().sets[0].param1,
            vec![ParamValue::HidUsage]
        );
        assert_eq!(
            actions.parameter_metadata(MOMENTARY_LAYER).unwrap().sets[0].param1,
            vec![ParamValue::LayerId]
        );
        assert!(actions.parameter_metadata(NONE).unwrap().sets[0].param1.is_empty());
    }

    #[test]
    fn builtin_names() {
        for name in [KEY_PRESS, MOMENTARY_LAYER, TOGGLE_LAYER, TRANSPARENT, NONE] {
            assert!(is_builtin(name));
        }
        assert!(!is_builtin("ah"));
    }
}
