//! The command and status-poll channels to the hub.
//!
//! Dispatch is fire-and-forget from the sequencer's point of view: the
//! tick loop hands a command off and proceeds without waiting for the
//! reply. Replies only feed the status display; a lost command is
//! compensated by the time-based resend, never by content inspection.

use async_trait::async_trait;

use crate::command::{CommandReply, HubCommand};
use crate::model::HubSnapshot;

/// Errors on the wire to the hub.
#[derive(Clone, Debug)]
pub enum DispatchError {
    /// The request never completed (connect, timeout, IO).
    Transport { message: String },
    /// The hub answered with a non-success HTTP status.
    Status { code: u16 },
    /// The reply body was not something we understand.
    BadPayload { message: String },
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Transport { message } => write!(f, "transport error: {}", message),
            DispatchError::Status { code } => write!(f, "hub returned HTTP {}", code),
            DispatchError::BadPayload { message } => write!(f, "bad reply payload: {}", message),
        }
    }
}

impl std::error::Error for DispatchError {}

/// The command channel: sends one named, zone-scoped command and returns
/// the hub's reply.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, command: HubCommand) -> Result<CommandReply, DispatchError>;

    /// Human-readable name of this backend.
    fn name(&self) -> &'static str;
}

/// The status-poll channel: fetches the hub's full telemetry snapshot.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<HubSnapshot, DispatchError>;
}
