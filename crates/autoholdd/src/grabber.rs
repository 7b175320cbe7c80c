use crate::uinput_emitter::VIRTUAL_DEVICE_NAME;
use anyhow::{Context, Result};
use evdev::{Device, EventType};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A key event from a grabbed keyboard, tagged with the device index.
#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub device_idx: usize,
    pub code: u16,
    /// 0 release, 1 press, 2 autorepeat.
    pub value: i32,
}

/// Find all keyboard devices under /dev/input/.
pub fn find_keyboards() -> Result<Vec<PathBuf>> {
    let mut keyboards = Vec::new();
    let input_dir = Path::new("/dev/input");

    for entry in std::fs::read_dir(input_dir).context("reading /dev/input")? {
        let path = entry?.path();

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !name.starts_with("event") {
            continue;
        }

        match Device::open(&path) {
            Ok(dev) => {
                if dev.name() == Some(VIRTUAL_DEVICE_NAME) {
                    debug!(path = %path.display(), "skipping own virtual device");
                    continue;
                }
                if is_keyboard(&dev) {
                    info!(path = %path.display(), name = ?dev.name(), "found keyboard");
                    keyboards.push(path);
                }
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping device");
            }
        }
    }

    Ok(keyboards)
}

/// A device is a keyboard if it reports letter keys and Enter.
fn is_keyboard(dev: &Device) -> bool {
    let Some(keys) = dev.supported_keys() else {
        return false;
    };
    keys.contains(evdev::Key::KEY_A)
        && keys.contains(evdev::Key::KEY_Z)
        && keys.contains(evdev::Key::KEY_ENTER)
}

/// Grab a keyboard and forward its key events until the receiver goes away
/// or the device errors. Non-key events are dropped; the virtual device
/// writes its own SYN reports.
pub async fn grab_device(
    path: PathBuf,
    device_idx: usize,
    tx: mpsc::UnboundedSender<KeyEvent>,
) -> Result<()> {
    let mut dev = Device::open(&path).with_context(|| format!("opening {}", path.display()))?;

    let dev_name = dev.name().unwrap_or("unknown").to_string();
    info!(device = %dev_name, path = %path.display(), "grabbing device");

    dev.grab()
        .with_context(|| format!("grabbing {}", path.display()))?;

    let mut stream = dev.into_event_stream().context("creating event stream")?;

    loop {
        match stream.next_event().await {
            Ok(event) if event.event_type() == EventType::KEY => {
                let key = KeyEvent {
                    device_idx,
                    code: event.code(),
                    value: event.value(),
                };
                if tx.send(key).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(device = %dev_name, error = %e, "device error, stopping grab");
                break;
            }
        }
    }

    Ok(())
}
