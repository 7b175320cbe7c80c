mod grabber;
mod uinput_emitter;

use anyhow::{Context, Result};
use autohold_core::config::{self, Config};
use autohold_core::ipc::{self, ClientMsg, DaemonMsg};
use autohold_core::pipeline::Pipeline;
use autohold_core::timer::Clock;
use evdev::uinput::VirtualDevice;
use grabber::KeyEvent;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, trace, warn};

/// Everything that mutates key state. Holding the lock is what serializes
/// key events, timer expiry and IPC commands.
struct Shared {
    pipeline: Pipeline,
    vdev: VirtualDevice,
}

/// Backspace → Escape → Enter within a second exits the daemon.
const PANIC_SEQ: [u16; 3] = [14, 1, 28];
const PANIC_WINDOW: Duration = Duration::from_millis(1000);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("autoholdd=info".parse()?)
                .add_directive("autohold_core=info".parse()?),
        )
        .init();

    info!("autoholdd starting");

    let config = Config::load().context("loading config")?;
    let pipeline = Pipeline::from_config(&config).context("building keymap")?;
    info!(
        instances = pipeline.registry().len(),
        layers = config.layer_count(),
        "keymap loaded"
    );

    let keyboards = grabber::find_keyboards().context("finding keyboards")?;
    if keyboards.is_empty() {
        anyhow::bail!("no keyboards found; check permissions (group 'input' or udev rules)");
    }

    let vdev = uinput_emitter::create_virtual_device().context("creating virtual device")?;

    let clock = Clock::new();
    let shared = Arc::new(Mutex::new(Shared { pipeline, vdev }));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    for (idx, path) in keyboards.iter().enumerate() {
        let tx = event_tx.clone();
        let path = path.clone();
        tokio::spawn(async move {
            if let Err(e) = grabber::grab_device(path.clone(), idx, tx).await {
                error!(path = %path.display(), error = %e, "grabber task failed");
            }
        });
    }
    drop(event_tx); // channel closes once every grabber exits

    let socket_path = config::socket_path();
    let _ = std::fs::remove_file(&socket_path);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("binding socket {}", socket_path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o666)).ok();
    }
    info!(path = %socket_path.display(), "IPC socket listening");

    let shared_ipc = Arc::clone(&shared);
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    tokio::spawn(handle_ipc_client(stream, Arc::clone(&shared_ipc), clock));
                }
                Err(e) => {
                    warn!(error = %e, "IPC accept error");
                }
            }
        }
    });

    let mut panic_ring: [(u16, Instant); 3] = [(0, Instant::now()); 3];
    let mut panic_idx: usize = 0;

    // Sleep until the earliest auto-hold deadline or the next key event.
    loop {
        let deadline = shared.lock().await.pipeline.next_deadline();
        let sleep_fut = match deadline {
            Some(ms) => tokio::time::sleep_until(tokio::time::Instant::from_std(clock.instant_at(ms))),
            None => tokio::time::sleep(Duration::from_secs(86400)),
        };
        let has_deadline = deadline.is_some();

        // Timers first when both are ready; key events also fire due timers themselves.
        tokio::select! {
            biased;

            _ = sleep_fut, if has_deadline => {
                let mut shared = shared.lock().await;
                let held = shared.pipeline.poll_timers(clock.now_ms());
                if held > 0 {
                    debug!(held, "auto-hold timeout reached");
                }
            }
            Some(key) = event_rx.recv() => {
                if key.value == 1 {
                    panic_ring[panic_idx] = (key.code, Instant::now());
                    panic_idx = (panic_idx + 1) % 3;
                    let codes = [0, 1, 2].map(|i| panic_ring[(panic_idx + i) % 3].0);
                    if codes == PANIC_SEQ {
                        let first = panic_ring[panic_idx].1;
                        let last = panic_ring[(panic_idx + 2) % 3].1;
                        if last.duration_since(first) < PANIC_WINDOW {
                            info!("panic key combo detected (Backspace→Escape→Enter), exiting");
                            std::process::exit(0);
                        }
                    }
                }

                let mut shared = shared.lock().await;
                handle_key(&mut shared, key, clock.now_ms());
            }
            else => break,
        }
    }

    info!("autoholdd shutting down");
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

fn handle_key(shared: &mut Shared, key: KeyEvent, now: i64) {
    // Autorepeat is left to the display server.
    if key.value == 2 {
        return;
    }
    let pressed = key.value == 1;
    match shared.pipeline.process(u32::from(key.code), pressed, now) {
        Ok(status) => {
            trace!(device = key.device_idx, code = key.code, pressed, ?status, "key handled");
        }
        Err(e) => {
            warn!(code = key.code, pressed, error = %e, "binding failed");
        }
    }
    flush(shared);
}

/// Emit every key activation the pipeline raised.
fn flush(shared: &mut Shared) {
    let activations = shared.pipeline.drain_keycodes();
    if activations.is_empty() {
        return;
    }
    if let Err(e) = uinput_emitter::emit_activations(&mut shared.vdev, &activations) {
        warn!(error = %e, "emit error");
    }
}

async fn handle_ipc_client(stream: UnixStream, shared: Arc<Mutex<Shared>>, clock: Clock) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(msg) = ipc::decode_client(&line) else {
            continue;
        };

        let reply = {
            let mut shared = shared.lock().await;
            match msg {
                ClientMsg::GetStatus => DaemonMsg::Status {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    active_layers: shared.pipeline.active_layers(),
                    instances: shared.pipeline.snapshot(),
                    released_total: shared.pipeline.released_total(),
                },
                ClientMsg::GetMetadata { behavior } => {
                    match shared.pipeline.parameter_metadata(&behavior) {
                        Ok(meta) => DaemonMsg::Metadata {
                            behavior,
                            sets: meta.sets,
                        },
                        Err(e) => DaemonMsg::Ack {
                            ok: false,
                            message: e.to_string(),
                        },
                    }
                }
                ClientMsg::ReleaseAll => {
                    let released = shared.pipeline.release_held(clock.now_ms());
                    flush(&mut shared);
                    info!(released, "held keys released via IPC");
                    DaemonMsg::Ack {
                        ok: true,
                        message: format!("released {}", released),
                    }
                }
            }
        };

        if writer.write_all(ipc::encode(&reply).as_bytes()).await.is_err() {
            break;
        }
    }
}
