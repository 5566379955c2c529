//! The zone reset sequence controller.
//!
//! `SequenceController` owns all sequence state and is driven one tick at
//! a time by whoever holds it; it performs no IO and keeps no timers of
//! its own. Each call returns the dispatch decision (if any) for that
//! step, tagged as scheduled or as a forced override, and the caller
//! forwards it to the command channel.
//!
//! The command channel offers no delivery guarantee, so the controller
//! re-asserts the current command at most once every [`RESEND_WINDOW`]
//! ticks rather than waiting for acknowledgements. A phase transition
//! always sends immediately.

use crate::command::{CommandKind, HubCommand};
use crate::model::ZoneId;
use crate::schedule::{
    self, ABORT_FAST_FORWARD_BELOW, ABORT_FAST_FORWARD_TO, RESEND_WINDOW, SEQUENCE_END,
};

/// A decision to send one command to the hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Called for by the schedule at the current tick.
    Scheduled(HubCommand),
    /// Forced outside the schedule (abort, teardown).
    Override(HubCommand),
}

impl Dispatch {
    pub fn command(&self) -> HubCommand {
        match self {
            Dispatch::Scheduled(cmd) | Dispatch::Override(cmd) => *cmd,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, Dispatch::Override(_))
    }
}

/// Outcome of advancing the sequence by one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No sequence is running; the tick was ignored.
    Idle,
    /// The sequence advanced and may have dispatched a command.
    Advanced {
        elapsed: u32,
        percent: u8,
        dispatch: Option<Dispatch>,
    },
    /// The terminal tick: the return-to-automatic command was issued and
    /// the sequence halted.
    Finished { dispatch: Dispatch },
}

/// Per-run sequence state. One controller drives at most one zone at a
/// time; a second controller for another zone is independent.
#[derive(Clone, Copy, Debug, Default)]
struct SequenceState {
    zone: Option<ZoneId>,
    elapsed: u32,
    running: bool,
    last_command: Option<CommandKind>,
    last_command_at: u32,
    abort_armed: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SequenceController {
    state: SequenceState,
}

impl SequenceController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running(&self) -> bool {
        self.state.running
    }

    pub fn elapsed(&self) -> u32 {
        self.state.elapsed
    }

    /// Zone of the current (or most recent) run.
    pub fn zone(&self) -> Option<ZoneId> {
        self.state.zone
    }

    pub fn last_command(&self) -> Option<CommandKind> {
        self.state.last_command
    }

    /// Begin a reset run for `zone` and return the immediate tick-0
    /// dispatch. Starting while a run is active is a no-op.
    pub fn start(&mut self, zone: ZoneId) -> Option<Dispatch> {
        if self.state.running {
            return None;
        }
        self.state = SequenceState {
            zone: Some(zone),
            elapsed: 0,
            running: true,
            last_command: None,
            last_command_at: 0,
            abort_armed: true,
        };
        let kind = schedule::command_for(0);
        Some(self.record(Dispatch::Scheduled(HubCommand::new(kind, zone))))
    }

    /// Advance the sequence by one tick.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.state.running {
            return TickOutcome::Idle;
        }
        // zone is always set while running
        let zone = match self.state.zone {
            Some(zone) => zone,
            None => return TickOutcome::Idle,
        };

        self.state.elapsed += 1;
        let elapsed = self.state.elapsed;

        if elapsed >= SEQUENCE_END {
            // Terminal transition: always sent, never deduplicated.
            let dispatch =
                self.record(Dispatch::Scheduled(HubCommand::new(CommandKind::ZoneAuto, zone)));
            self.state.running = false;
            return TickOutcome::Finished { dispatch };
        }

        let kind = schedule::command_for(elapsed);
        let due = self.state.last_command != Some(kind)
            || elapsed - self.state.last_command_at >= RESEND_WINDOW;
        let dispatch = due.then(|| self.record(Dispatch::Scheduled(HubCommand::new(kind, zone))));

        TickOutcome::Advanced {
            elapsed,
            percent: schedule::progress_percent(elapsed),
            dispatch,
        }
    }

    /// Abort the running sequence.
    ///
    /// Early aborts fast-forward into the monitor tail so the run still
    /// terminates within ten ticks; later aborts leave `elapsed` alone.
    /// Either way a forced return-to-automatic is sent immediately. Note
    /// that with `elapsed` between the fast-forward threshold and the
    /// terminal tick, the schedule resumes on the next tick and may
    /// re-assert a non-terminal command, superseding the override until
    /// the run reaches its natural end.
    ///
    /// Only the first abort of a run is honored; the request is ignored
    /// once used, and when idle.
    pub fn abort(&mut self) -> Option<Dispatch> {
        if !self.state.running || !self.state.abort_armed {
            return None;
        }
        let zone = self.state.zone?;
        self.state.abort_armed = false;
        if self.state.elapsed < ABORT_FAST_FORWARD_BELOW {
            self.state.elapsed = ABORT_FAST_FORWARD_TO;
        }
        Some(self.record(Dispatch::Override(HubCommand::new(CommandKind::ZoneAuto, zone))))
    }

    // Updated only when a command is actually handed out, never
    // speculatively.
    fn record(&mut self, dispatch: Dispatch) -> Dispatch {
        self.state.last_command = Some(dispatch.command().kind);
        self.state.last_command_at = self.state.elapsed;
        dispatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind::*;

    fn dispatched(outcome: TickOutcome) -> Option<CommandKind> {
        match outcome {
            TickOutcome::Advanced { dispatch, .. } => dispatch.map(|d| d.command().kind),
            TickOutcome::Finished { dispatch } => Some(dispatch.command().kind),
            TickOutcome::Idle => None,
        }
    }

    #[test]
    fn test_start_dispatches_zone_on() {
        let mut ctl = SequenceController::new();
        let d = ctl.start(3).unwrap();
        assert_eq!(d, Dispatch::Scheduled(HubCommand::new(ZoneOn, 3)));
        assert!(ctl.running());
        assert_eq!(ctl.elapsed(), 0);
    }

    #[test]
    fn test_start_while_running_is_noop() {
        let mut ctl = SequenceController::new();
        ctl.start(3);
        for _ in 0..10 {
            ctl.tick();
        }
        let elapsed = ctl.elapsed();
        let last = ctl.last_command();
        assert_eq!(ctl.start(5), None);
        assert_eq!(ctl.elapsed(), elapsed);
        assert_eq!(ctl.last_command(), last);
        assert_eq!(ctl.zone(), Some(3));
    }

    #[test]
    fn test_unchanged_command_respects_resend_window() {
        let mut ctl = SequenceController::new();
        ctl.start(1); // ZoneOn sent at elapsed 0
        for t in 1..=4 {
            let outcome = ctl.tick();
            assert_eq!(dispatched(outcome), None, "tick {} resent too early", t);
        }
        // Five ticks after the last send, the same command goes out again.
        assert_eq!(dispatched(ctl.tick()), Some(ZoneOn));
    }

    #[test]
    fn test_phase_transition_dispatches_immediately() {
        let mut ctl = SequenceController::new();
        ctl.start(1);
        let mut last_sent_at = 0;
        for _ in 1..=30 {
            if let TickOutcome::Advanced { elapsed, dispatch: Some(_), .. } = ctl.tick() {
                last_sent_at = elapsed;
            }
        }
        // 30 is a resend tick; 31 changes phase and must send regardless
        // of the window.
        assert_eq!(last_sent_at, 30);
        assert_eq!(dispatched(ctl.tick()), Some(ZoneOff));
    }

    #[test]
    fn test_full_run_dispatch_trace() {
        let mut ctl = SequenceController::new();
        assert_eq!(
            ctl.start(3).map(|d| d.command().kind),
            Some(ZoneOn)
        );

        let mut finished = false;
        let mut seen = Vec::new();
        while !finished {
            match ctl.tick() {
                TickOutcome::Advanced { elapsed, dispatch, .. } => {
                    if let Some(d) = dispatch {
                        seen.push((elapsed, d.command().kind));
                    }
                }
                TickOutcome::Finished { dispatch } => {
                    assert_eq!(dispatch.command().kind, ZoneAuto);
                    assert_eq!(ctl.elapsed(), 205);
                    finished = true;
                }
                TickOutcome::Idle => unreachable!(),
            }
        }
        assert!(!ctl.running());

        // Every phase boundary sends its new command on the boundary tick.
        for boundary in [(31, ZoneOff), (46, ZoneOn), (61, ZoneOff), (76, ZoneOn),
                         (166, ZoneOff), (186, GetZoneStatus)] {
            assert!(seen.contains(&boundary), "missing {:?}", boundary);
        }
        // No two consecutive sends of the same command closer than the
        // resend window.
        let mut prev: Option<(u32, CommandKind)> = Some((0, ZoneOn));
        for &(at, kind) in &seen {
            if let Some((pat, pkind)) = prev {
                if pkind == kind {
                    assert!(at - pat >= 5, "resent {:?} after {} ticks", kind, at - pat);
                }
            }
            prev = Some((at, kind));
        }
    }

    #[test]
    fn test_early_abort_fast_forwards_and_converges() {
        let mut ctl = SequenceController::new();
        ctl.start(3);
        for _ in 0..40 {
            ctl.tick();
        }
        assert_eq!(ctl.elapsed(), 40);

        let d = ctl.abort().unwrap();
        assert!(d.is_override());
        assert_eq!(d.command().kind, ZoneAuto);
        assert_eq!(ctl.elapsed(), 195);

        // Completes within the next ten ticks.
        let mut ticks = 0;
        loop {
            ticks += 1;
            if let TickOutcome::Finished { dispatch } = ctl.tick() {
                assert_eq!(dispatch.command().kind, ZoneAuto);
                break;
            }
            assert!(ticks <= 10);
        }
        assert!(!ctl.running());
    }

    #[test]
    fn test_late_abort_is_superseded_by_schedule() {
        let mut ctl = SequenceController::new();
        ctl.start(3);
        for _ in 0..150 {
            ctl.tick();
        }
        assert_eq!(ctl.elapsed(), 150);

        let d = ctl.abort().unwrap();
        assert_eq!(d, Dispatch::Override(HubCommand::new(ZoneAuto, 3)));
        // No fast-forward in this window.
        assert_eq!(ctl.elapsed(), 150);

        // Still inside the third on-window, so the very next tick
        // re-asserts ZoneOn over the override.
        assert_eq!(dispatched(ctl.tick()), Some(ZoneOn));
        assert_eq!(ctl.elapsed(), 151);
    }

    #[test]
    fn test_second_abort_is_ignored() {
        let mut ctl = SequenceController::new();
        ctl.start(3);
        for _ in 0..40 {
            ctl.tick();
        }
        assert!(ctl.abort().is_some());
        assert_eq!(ctl.abort(), None);

        // A fresh run re-arms the abort.
        while !matches!(ctl.tick(), TickOutcome::Finished { .. }) {}
        ctl.start(3);
        ctl.tick();
        assert!(ctl.abort().is_some());
    }

    #[test]
    fn test_abort_while_idle_is_noop() {
        let mut ctl = SequenceController::new();
        assert_eq!(ctl.abort(), None);
    }

    #[test]
    fn test_halted_controller_is_inert() {
        let mut ctl = SequenceController::new();
        ctl.start(3);
        while !matches!(ctl.tick(), TickOutcome::Finished { .. }) {}

        let elapsed = ctl.elapsed();
        assert_eq!(ctl.tick(), TickOutcome::Idle);
        assert_eq!(ctl.abort(), None);
        assert_eq!(ctl.elapsed(), elapsed);
        assert!(!ctl.running());
    }

    #[test]
    fn test_elapsed_never_exceeds_end_while_running() {
        let mut ctl = SequenceController::new();
        ctl.start(7);
        loop {
            match ctl.tick() {
                TickOutcome::Finished { .. } => break,
                _ => assert!(ctl.elapsed() < SEQUENCE_END),
            }
        }
        assert_eq!(ctl.elapsed(), SEQUENCE_END);
    }
}
