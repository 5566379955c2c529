//! Wire vocabulary for the hub command channel.
//!
//! Every command is a JSON POST of the form
//! `{ "command": <name>, "zoneId": <id>, "parameters": { .. } }`.
//! The hub answers either with a generic acknowledgement
//! (`{ "reload": bool }`, possibly empty) or, for status queries, with the
//! zone's reported state (`{ "setpoint": number, "on": bool }`).

use serde::{Deserialize, Serialize};

use crate::model::{ZoneId, ZoneStatus};

/// The commands the console issues, always scoped to a single zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    /// Force the zone on (the hub applies a timed high-setpoint hold).
    ZoneOn,
    /// Force the zone off (timed low-setpoint hold).
    ZoneOff,
    /// Cancel any hold and return the zone to schedule control.
    ZoneAuto,
    /// Ask for the zone's current setpoint and on/off state.
    GetZoneStatus,
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::ZoneOn => "ZoneOn",
            CommandKind::ZoneOff => "ZoneOff",
            CommandKind::ZoneAuto => "ZoneAuto",
            CommandKind::GetZoneStatus => "GetZoneStatus",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A command addressed to a concrete zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HubCommand {
    pub kind: CommandKind,
    pub zone: ZoneId,
}

impl HubCommand {
    pub fn new(kind: CommandKind, zone: ZoneId) -> Self {
        Self { kind, zone }
    }

    pub fn request(&self) -> CommandRequest {
        CommandRequest {
            command: self.kind.name().to_string(),
            zone_id: Some(self.zone),
            parameters: None,
        }
    }
}

impl std::fmt::Display for HubCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} zone={}", self.kind, self.zone)
    }
}

/// Request body for the hub's command endpoint.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Response body from the hub's command endpoint.
///
/// Variant order matters: a status reply carries both fields, a bare `{}`
/// or `{ "reload": true }` falls through to the acknowledgement.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CommandReply {
    ZoneStatus { setpoint: f64, on: bool },
    Ack {
        #[serde(default)]
        reload: bool,
    },
}

impl CommandReply {
    /// The zone status carried by this reply, if it is one.
    pub fn zone_status(&self) -> Option<ZoneStatus> {
        match self {
            CommandReply::ZoneStatus { setpoint, on } => Some(ZoneStatus {
                setpoint: *setpoint,
                on: *on,
            }),
            CommandReply::Ack { .. } => None,
        }
    }

    pub fn wants_reload(&self) -> bool {
        matches!(self, CommandReply::Ack { reload: true })
    }
}
