use crate::auto_hold::Phase;
use crate::behavior::ParameterSet;
use serde::{Deserialize, Serialize};

/// One auto-hold instance as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub name: String,
    pub phase: Phase,
    /// Position that armed the instance, while armed or held.
    pub position: Option<u32>,
    pub timeout_ms: u64,
}

/// Messages from daemon to clients (JSON-lines over Unix socket).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DaemonMsg {
    /// Status response.
    #[serde(rename = "status")]
    Status {
        version: String,
        /// Highest first.
        active_layers: Vec<u8>,
        instances: Vec<InstanceStatus>,
        /// Forced releases since the daemon started.
        released_total: u64,
    },
    /// Parameters accepted by a behavior.
    #[serde(rename = "metadata")]
    Metadata {
        behavior: String,
        sets: Vec<ParameterSet>,
    },
    /// Acknowledgement for commands.
    #[serde(rename = "ack")]
    Ack { ok: bool, message: String },
}

/// Messages from clients to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    /// Request current status.
    #[serde(rename = "get_status")]
    GetStatus,
    /// Request parameter metadata for an instance or built-in behavior.
    #[serde(rename = "get_metadata")]
    GetMetadata { behavior: String },
    /// Force-release every held instance.
    #[serde(rename = "release_all")]
    ReleaseAll,
}

/// Serialize a message as a JSON line (with trailing newline).
pub fn encode(msg: &impl Serialize) -> String {
    let mut s = serde_json::to_string(msg).unwrap_or_else(|_| String::from("{}"));
    s.push('\n');
    s
}

/// Deserialize a JSON line. Returns None on empty/whitespace input.
pub fn decode_daemon(line: &str) -> Option<DaemonMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

pub fn decode_client(line: &str) -> Option<ClientMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
