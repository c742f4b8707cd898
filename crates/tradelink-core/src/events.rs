//! Session events
//!
//! Sessions never call out to collaborators directly. Every transition pushes
//! a `SessionEvent` for the local viewers and, for proxy trades, a
//! `Replication` for the remote replica. The owner drains both after each call.

use serde::{Deserialize, Serialize};
use tradelink_types::{AbortReason, PerSide, Perspective};

/// Why a session was cancelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CancelReason {
    /// A participant closed the trade; `None` when requested by the host
    Requested { by: Option<Perspective> },
    /// A participant disconnected, on this process or the remote one
    Disconnected { player: String },
    /// The replicas could not be reconciled
    Desync { detail: String },
    /// The process is shutting down
    Shutdown,
}

/// Something local viewers should hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SlotChanged { perspective: Perspective, slot: usize },
    ReadyChanged { perspective: Perspective, ready: bool },
    CountdownStarted { seconds: u64 },
    CountdownTick { remaining_secs: u64 },
    CountdownAborted,
    ValidationFailed { reason: AbortReason },
    /// Non-blocking notice from a validation pass, for one side
    Warning { perspective: Perspective, notice: String },
    Completed,
    Cancelled { reason: CancelReason },
}

/// Result of a commit attempt, as relayed to the remote replica
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Icon bytes of both layouts as validated, in slot order
    Commit {
        snapshot: PerSide<Vec<(usize, Vec<u8>)>>,
    },
    Abort(AbortReason),
}

/// State change the remote replica must mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replication {
    IconChanged {
        perspective: Perspective,
        slot: usize,
        bytes: Vec<u8>,
    },
    ReadyChanged {
        perspective: Perspective,
        ready: bool,
    },
    /// Authoritative flags from the initiation server
    ReadyState { flags: PerSide<bool> },
    Outcome(Outcome),
    /// The locally hosted participant left
    Quit { player: String },
}
