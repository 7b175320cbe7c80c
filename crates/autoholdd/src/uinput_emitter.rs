use anyhow::{Context, Result};
use autohold_core::binding::KeyActivation;
use autohold_core::keycodes::MAX_KEYCODE;
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key};
use tracing::info;

/// Name of our own output device; the grabber skips it to avoid a feedback loop.
pub const VIRTUAL_DEVICE_NAME: &str = "autohold virtual keyboard";

pub trait EventEmitter {
    fn emit_events(&mut self, events: &[InputEvent]) -> Result<()>;
}

impl EventEmitter for VirtualDevice {
    fn emit_events(&mut self, events: &[InputEvent]) -> Result<()> {
        self.emit(events)?;
        Ok(())
    }
}

pub fn create_virtual_device() -> Result<VirtualDevice> {
    let mut keys = AttributeSet::<Key>::new();
    for code in 0..=MAX_KEYCODE {
        keys.insert(Key::new(code));
    }

    let vdev = VirtualDeviceBuilder::new()
        .context("creating VirtualDeviceBuilder")?
        .name(VIRTUAL_DEVICE_NAME)
        .with_keys(&keys)
        .context("setting keys")?
        .build()
        .context("building virtual device")?;

    info!("virtual uinput device created");
    Ok(vdev)
}

fn syn() -> InputEvent {
    InputEvent::new(EventType::SYNCHRONIZATION, 0, 0)
}

/// Write key activations in order, each as its own key event + SYN batch so
/// modifier changes register before the key that follows them.
pub fn emit_activations(emitter: &mut impl EventEmitter, activations: &[KeyActivation]) -> Result<()> {
    for activation in activations {
        let value = if activation.pressed { 1 } else { 0 };
        emitter.emit_events(&[
            InputEvent::new(EventType::KEY, activation.keycode, value),
            syn(),
        ])?;
    }
    Ok(())
}
