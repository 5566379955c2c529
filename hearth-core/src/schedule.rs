//! The zone reset schedule.
//!
//! A reset walks the actuator through a fixed on/off/auto cycle. Which
//! command is due is purely a function of the elapsed tick count: the
//! table below is scanned in order and the first upper bound that holds
//! wins. The long third on/off pair and the monitor tail give the
//! actuator time to settle and let the hub's reported state be observed
//! before control is handed back to the schedule.

use crate::command::CommandKind;

/// Tick at which the sequence sends its terminal command and halts.
pub const SEQUENCE_END: u32 = 205;

/// Minimum tick gap before an unchanged command is re-asserted.
pub const RESEND_WINDOW: u32 = 5;

/// Aborts before this tick fast-forward into the monitor tail.
pub const ABORT_FAST_FORWARD_BELOW: u32 = 105;

/// Where an early abort lands: inside the monitor window, ten ticks
/// from the terminal command.
pub const ABORT_FAST_FORWARD_TO: u32 = 195;

/// Named segment of the reset schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    On1,
    Off1,
    On2,
    Off2,
    On3,
    Off3,
    Monitor,
    Finish,
}

// Upper-bound thresholds, scanned in order.
const PHASE_BOUNDS: &[(u32, Phase)] = &[
    (30, Phase::On1),
    (45, Phase::Off1),
    (60, Phase::On2),
    (75, Phase::Off2),
    (165, Phase::On3),
    (185, Phase::Off3),
    (SEQUENCE_END - 1, Phase::Monitor),
];

/// Phase active at the given elapsed tick count.
pub fn phase_for(elapsed: u32) -> Phase {
    for &(bound, phase) in PHASE_BOUNDS {
        if elapsed <= bound {
            return phase;
        }
    }
    Phase::Finish
}

/// Command the schedule calls for at the given elapsed tick count.
pub fn command_for(elapsed: u32) -> CommandKind {
    match phase_for(elapsed) {
        Phase::On1 | Phase::On2 | Phase::On3 => CommandKind::ZoneOn,
        Phase::Off1 | Phase::Off2 | Phase::Off3 => CommandKind::ZoneOff,
        Phase::Monitor => CommandKind::GetZoneStatus,
        Phase::Finish => CommandKind::ZoneAuto,
    }
}

/// Display progress for the given elapsed tick count, clamped to 0..=100.
pub fn progress_percent(elapsed: u32) -> u8 {
    ((elapsed * 100) / SEQUENCE_END).min(100) as u8
}
