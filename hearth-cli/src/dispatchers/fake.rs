use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use hearth_core::command::{CommandKind, CommandReply, HubCommand};
use hearth_core::dispatch::{DispatchError, Dispatcher, SnapshotSource};
use hearth_core::model::{HubSnapshot, SensorReading, ZoneId, ZoneStatus};

// Setpoints the hub applies for forced holds.
const HOLD_ON_SETPOINT: f64 = 35.0;
const HOLD_OFF_SETPOINT: f64 = 15.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Hold {
    On,
    Off,
}

#[derive(Clone, Copy, Debug)]
struct ZoneSim {
    base_setpoint: f64,
    base_on: bool,
    hold: Option<Hold>,
}

impl Default for ZoneSim {
    fn default() -> Self {
        Self {
            base_setpoint: 21.0,
            base_on: false,
            hold: None,
        }
    }
}

impl ZoneSim {
    fn status(&self) -> ZoneStatus {
        match self.hold {
            Some(Hold::On) => ZoneStatus {
                setpoint: HOLD_ON_SETPOINT,
                on: true,
            },
            Some(Hold::Off) => ZoneStatus {
                setpoint: HOLD_OFF_SETPOINT,
                on: false,
            },
            None => ZoneStatus {
                setpoint: self.base_setpoint,
                on: self.base_on,
            },
        }
    }
}

#[derive(Debug, Default)]
struct FakeHubState {
    zones: BTreeMap<ZoneId, ZoneSim>,
    sent: Vec<HubCommand>,
    fail_next: u32,
}

/// In-process hub simulation for demo mode and tests.
///
/// Mimics the real hub's observable behavior: a zone-on command puts a
/// high-setpoint hold on the zone, zone-off a low one, and
/// return-to-automatic cancels the hold so the zone's own schedule
/// values show again. `fail_next` makes the next N sends fail, which is
/// how the resend policy gets exercised.
pub struct FakeHub {
    inner: Mutex<FakeHubState>,
}

impl FakeHub {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FakeHubState::default()),
        }
    }

    pub fn with_zone(self, id: ZoneId, base_setpoint: f64, base_on: bool) -> Self {
        {
            let mut state = self.inner.lock().unwrap();
            state.zones.insert(
                id,
                ZoneSim {
                    base_setpoint,
                    base_on,
                    hold: None,
                },
            );
        }
        self
    }

    /// Make the next `n` sends fail with a transport error.
    #[allow(dead_code)]
    pub fn fail_next(&self, n: u32) {
        self.inner.lock().unwrap().fail_next = n;
    }

    /// Commands the hub has accepted, in arrival order.
    #[allow(dead_code)]
    pub fn accepted(&self) -> Vec<HubCommand> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Currently reported status for a zone.
    #[allow(dead_code)]
    pub fn zone_status(&self, id: ZoneId) -> ZoneStatus {
        self.inner
            .lock()
            .unwrap()
            .zones
            .entry(id)
            .or_default()
            .status()
    }
}

impl Default for FakeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dispatcher for FakeHub {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn send(&self, command: HubCommand) -> Result<CommandReply, DispatchError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(DispatchError::Transport {
                message: "injected failure".into(),
            });
        }

        state.sent.push(command);
        let sim = state.zones.entry(command.zone).or_default();
        match command.kind {
            CommandKind::ZoneOn => {
                sim.hold = Some(Hold::On);
                Ok(CommandReply::Ack { reload: false })
            }
            CommandKind::ZoneOff => {
                sim.hold = Some(Hold::Off);
                Ok(CommandReply::Ack { reload: false })
            }
            CommandKind::ZoneAuto => {
                sim.hold = None;
                Ok(CommandReply::Ack { reload: false })
            }
            CommandKind::GetZoneStatus => {
                let status = sim.status();
                Ok(CommandReply::ZoneStatus {
                    setpoint: status.setpoint,
                    on: status.on,
                })
            }
        }
    }
}

#[async_trait]
impl SnapshotSource for FakeHub {
    async fn fetch_snapshot(&self) -> Result<HubSnapshot, DispatchError> {
        let state = self.inner.lock().unwrap();
        let zones = state
            .zones
            .iter()
            .map(|(id, sim)| (*id, sim.status()))
            .collect();
        Ok(HubSnapshot {
            flow_setpoint: Some(55.0),
            valve_position: Some(42.0),
            sensors: vec![
                SensorReading {
                    name: "flow".into(),
                    temperature: Some(54.6),
                    crc_errors: 0,
                    empty_errors: 0,
                    failures: 0,
                },
                SensorReading {
                    name: "return".into(),
                    temperature: Some(41.2),
                    crc_errors: 1,
                    empty_errors: 0,
                    failures: 0,
                },
            ],
            zones,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hold_semantics() {
        let hub = FakeHub::new().with_zone(3, 21.0, false);

        hub.send(HubCommand::new(CommandKind::ZoneOn, 3)).await.unwrap();
        assert_eq!(
            hub.zone_status(3),
            ZoneStatus { setpoint: 35.0, on: true }
        );

        hub.send(HubCommand::new(CommandKind::ZoneOff, 3)).await.unwrap();
        assert_eq!(
            hub.zone_status(3),
            ZoneStatus { setpoint: 15.0, on: false }
        );

        hub.send(HubCommand::new(CommandKind::ZoneAuto, 3)).await.unwrap();
        assert_eq!(
            hub.zone_status(3),
            ZoneStatus { setpoint: 21.0, on: false }
        );
    }

    #[tokio::test]
    async fn test_status_reply_reflects_hold() {
        let hub = FakeHub::new().with_zone(2, 19.5, true);
        let reply = hub
            .send(HubCommand::new(CommandKind::GetZoneStatus, 2))
            .await
            .unwrap();
        assert_eq!(
            reply.zone_status(),
            Some(ZoneStatus { setpoint: 19.5, on: true })
        );
    }

    #[tokio::test]
    async fn test_injected_failures_consume_then_clear() {
        let hub = FakeHub::new();
        hub.fail_next(2);

        assert!(hub.send(HubCommand::new(CommandKind::ZoneOn, 1)).await.is_err());
        assert!(hub.send(HubCommand::new(CommandKind::ZoneOn, 1)).await.is_err());
        assert!(hub.send(HubCommand::new(CommandKind::ZoneOn, 1)).await.is_ok());
        // Failed sends never reach the accepted log.
        assert_eq!(hub.accepted().len(), 1);
    }
}
