use anyhow::{Context, Result};
use autohold_core::config;
use autohold_core::keycodes;
use autohold_core::ipc::{self, ClientMsg, DaemonMsg};
use clap::{Parser, Subcommand};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;

#[derive(Parser)]
#[command(name = "autoholdctl", about = "Control the autoholdd daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show active layers and auto-hold instances
    Status,
    /// Release every auto-held key
    ReleaseAll,
    /// Show the parameters a behavior accepts
    Metadata {
        /// Auto-hold instance or built-in behavior name (e.g. ah_nav, kp, mo)
        behavior: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let socket_path = config::socket_path();
    let stream = UnixStream::connect(&socket_path).with_context(|| {
        format!(
            "connecting to autoholdd at {}\nIs the daemon running?",
            socket_path.display()
        )
    })?;

    let mut writer = stream.try_clone().context("cloning stream")?;
    let reader = BufReader::new(stream);

    let msg = match cli.command {
        Command::Status => ClientMsg::GetStatus,
        Command::ReleaseAll => ClientMsg::ReleaseAll,
        Command::Metadata { behavior } => ClientMsg::GetMetadata { behavior },
    };

    writer
        .write_all(ipc::encode(&msg).as_bytes())
        .context("sending command")?;

    for line in reader.lines() {
        let line = line.context("reading response")?;
        let Some(resp) = ipc::decode_daemon(&line) else {
            continue;
        };
        match resp {
            DaemonMsg::Status {
                version,
                active_layers,
                instances,
                released_total,
            } => {
                println!("autoholdd v{}", version);
                println!("  layers:   {:?}", active_layers);
                println!("  released: {}", released_total);
                for i in instances {
                    let at = i.position.map(position_label).unwrap_or_default();
                    println!("  {:<16} {:?}{} ({} ms)", i.name, i.phase, at, i.timeout_ms);
                }
            }
            DaemonMsg::Metadata { behavior, sets } => {
                println!("{}", behavior);
                for (n, set) in sets.iter().enumerate() {
                    println!("  set {}: param1 {:?}, param2 {:?}", n, set.param1, set.param2);
                }
            }
            DaemonMsg::Ack { ok, message } => {
                if ok {
                    println!("{}", message);
                } else {
                    eprintln!("error: {}", message);
                    std::process::exit(1);
                }
            }
        }
        break;
    }

    Ok(())
}

fn position_label(position: u32) -> String {
    let name = u16::try_from(position).ok().and_then(keycodes::keycode_name);
    match name {
        Some(name) => format!(" @{}", name),
        None => format!(" @{}", position),
    }
}
