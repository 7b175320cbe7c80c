use crate::behavior::ActionInvoker;
use crate::binding::{KeyActivation, Status};
use crate::registry::Registry;
use tracing::debug;

/// Releases held auto-hold instances when an unrelated key is pressed.
///
/// Subscribed to every key activation in the system. It never consumes the
/// event: the return value is always [`Status::Bubble`].
#[derive(Debug, Default)]
pub struct ReleaseListener {
    released: u64,
}

impl ReleaseListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key_activation(
        &mut self,
        activation: &KeyActivation,
        registry: &mut Registry,
        invoker: &mut dyn ActionInvoker,
    ) -> Status {
        if !activation.pressed {
            return Status::Bubble;
        }
        let released = self.release_held(registry, invoker, activation.timestamp);
        if released > 0 {
            debug!(keycode = activation.keycode, released, "key press released auto-held keys");
        }
        Status::Bubble
    }

    /// Force-release every held instance in registration order.
    pub fn release_held(
        &mut self,
        registry: &mut Registry,
        invoker: &mut dyn ActionInvoker,
        now: i64,
    ) -> usize {
        let mut count = 0;
        for instance in registry.iter_mut() {
            if instance.force_release(now, invoker) {
                count += 1;
            }
        }
        self.released += count as u64;
        count
    }

    /// Total forced releases since startup.
    pub fn released_total(&self) -> u64 {
        self.released
    }
}
