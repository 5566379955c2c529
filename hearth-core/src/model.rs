use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Numeric zone identifier as the hub reports it.
pub type ZoneId = u32;

/// Status the hub reports for a single zone.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ZoneStatus {
    pub setpoint: f64,
    pub on: bool,
}

/// A zone reference: hub id plus the display name configured for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
}

/// One temperature sensor in the full telemetry snapshot.
///
/// A sensor that is present but currently unreadable reports no
/// temperature; error counters are cumulative since hub boot.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub name: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub crc_errors: u32,
    #[serde(default)]
    pub empty_errors: u32,
    #[serde(default)]
    pub failures: u32,
}

/// Full hub telemetry snapshot: boiler control values plus sensor and
/// zone readouts, as returned by the periodic status poll.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubSnapshot {
    #[serde(default)]
    pub flow_setpoint: Option<f64>,
    #[serde(default)]
    pub valve_position: Option<f64>,
    #[serde(default)]
    pub sensors: Vec<SensorReading>,
    #[serde(default)]
    pub zones: BTreeMap<ZoneId, ZoneStatus>,
}
