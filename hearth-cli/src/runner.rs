use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use hearth_core::command::{CommandKind, HubCommand};
use hearth_core::dispatch::Dispatcher;
use hearth_core::model::ZoneId;
use hearth_core::reducer::{EventEmitter, RuntimeEvent};
use hearth_core::sequencer::{Dispatch, SequenceController, TickOutcome};

/// Control messages for a running sequence.
#[derive(Clone, Copy, Debug)]
pub enum SequenceCommand {
    /// User-initiated abort; the sequence still converges to its
    /// terminal command on its own schedule.
    Abort,
    /// Tear the runner down. A sequence still in flight gets a final
    /// return-to-automatic before the task exits.
    Shutdown,
}

/// Drives one reset sequence: owns the ticker, feeds the state machine,
/// and hands its dispatch decisions to the command channel.
///
/// Dispatches are not awaited by the tick loop; replies may arrive out
/// of order and carry their request sequence number so the reducer can
/// drop stale ones. Only the terminal and teardown sends are awaited,
/// so the process cannot exit under them.
pub struct SequenceRunner {
    dispatcher: Arc<dyn Dispatcher>,
    tick_interval: Duration,
    request_seq: Arc<AtomicU64>,
}

impl SequenceRunner {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, tick_interval: Duration) -> Self {
        Self {
            dispatcher,
            tick_interval,
            request_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    pub async fn run(
        self,
        zone: ZoneId,
        mut command_rx: mpsc::Receiver<SequenceCommand>,
        emitter: EventEmitter,
    ) {
        let mut controller = SequenceController::new();

        // Selecting a zone issues one status fetch so the display shows
        // where the zone starts from.
        self.spawn_send(
            Dispatch::Scheduled(HubCommand::new(CommandKind::GetZoneStatus, zone)),
            &emitter,
        );

        if let Some(dispatch) = controller.start(zone) {
            self.forward(dispatch, &emitter);
        }

        let start = tokio::time::Instant::now() + self.tick_interval;
        let mut ticker = tokio::time::interval_at(start, self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match controller.tick() {
                        TickOutcome::Advanced { elapsed, percent, dispatch } => {
                            emitter.emit(RuntimeEvent::SequenceProgress {
                                zone,
                                elapsed,
                                percent,
                            });
                            if let Some(d) = dispatch {
                                self.forward(d, &emitter);
                            }
                        }
                        TickOutcome::Finished { dispatch } => {
                            self.send_now(dispatch, &emitter).await;
                            emitter.emit(RuntimeEvent::SequenceFinished { zone });
                            break;
                        }
                        TickOutcome::Idle => break,
                    }
                }

                maybe_cmd = command_rx.recv() => {
                    match maybe_cmd {
                        Some(SequenceCommand::Abort) => {
                            if let Some(dispatch) = controller.abort() {
                                self.forward(dispatch, &emitter);
                                emitter.emit(RuntimeEvent::SequenceAborted {
                                    zone,
                                    elapsed: controller.elapsed(),
                                });
                            }
                        }
                        // A closed channel means the owner is gone;
                        // treat it like a shutdown.
                        Some(SequenceCommand::Shutdown) | None => {
                            if controller.running() {
                                let safety = Dispatch::Override(HubCommand::new(
                                    CommandKind::ZoneAuto,
                                    zone,
                                ));
                                self.send_now(safety, &emitter).await;
                            }
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Emit the dispatch event and fire the command without waiting for
    /// the reply.
    fn forward(&self, dispatch: Dispatch, emitter: &EventEmitter) {
        emitter.emit(RuntimeEvent::CommandDispatched {
            zone: dispatch.command().zone,
            kind: dispatch.command().kind,
            forced: dispatch.is_override(),
        });
        self.spawn_send(dispatch, emitter);
    }

    fn spawn_send(&self, dispatch: Dispatch, emitter: &EventEmitter) {
        let dispatcher = self.dispatcher.clone();
        let emitter = emitter.clone();
        let seq = self.request_seq.fetch_add(1, Ordering::SeqCst);
        let command = dispatch.command();
        tokio::spawn(async move {
            match dispatcher.send(command).await {
                Ok(reply) => {
                    debug!(%command, seq, "hub acknowledged");
                    if let Some(status) = reply.zone_status() {
                        emitter.emit(RuntimeEvent::ZoneStatusUpdated {
                            zone: command.zone,
                            status: Some(status),
                            request_seq: seq,
                        });
                    }
                }
                // Lost sends are recovered by the resend window, not
                // retried here.
                Err(e) => warn!(%command, seq, error = %e, "dispatch failed"),
            }
        });
    }

    async fn send_now(&self, dispatch: Dispatch, emitter: &EventEmitter) {
        emitter.emit(RuntimeEvent::CommandDispatched {
            zone: dispatch.command().zone,
            kind: dispatch.command().kind,
            forced: dispatch.is_override(),
        });
        if let Err(e) = self.dispatcher.send(dispatch.command()).await {
            warn!(command = %dispatch.command(), error = %e, "final dispatch failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::broadcast;

    use hearth_core::command::CommandKind::*;
    use hearth_core::reducer::EventEnvelope;

    use crate::dispatchers::FakeHub;

    fn harness(
        hub: Arc<FakeHub>,
        zone: ZoneId,
    ) -> (
        mpsc::Sender<SequenceCommand>,
        broadcast::Receiver<EventEnvelope>,
        tokio::task::JoinHandle<()>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = broadcast::channel(4096);
        let emitter = EventEmitter::new(event_tx);
        let runner = SequenceRunner::new(hub, Duration::from_secs(1));
        let handle = tokio::spawn(runner.run(zone, cmd_rx, emitter));
        (cmd_tx, event_rx, handle)
    }

    async fn wait_for_finish(event_rx: &mut broadcast::Receiver<EventEnvelope>) {
        loop {
            let env = event_rx.recv().await.expect("event bus closed early");
            if matches!(env.event, RuntimeEvent::SequenceFinished { .. }) {
                return;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_sequence_against_fake_hub() {
        let hub = Arc::new(FakeHub::new().with_zone(3, 21.0, false));
        let (_cmd_tx, mut event_rx, handle) = harness(hub.clone(), 3);

        wait_for_finish(&mut event_rx).await;
        handle.await.unwrap();

        let kinds: Vec<_> = hub.accepted().iter().map(|c| c.kind).collect();
        // Initial selection fetch, then the tick-0 zone-on.
        assert_eq!(kinds[0], GetZoneStatus);
        assert_eq!(kinds[1], ZoneOn);
        // Terminal command lands last and the hold is gone.
        assert_eq!(*kinds.last().unwrap(), ZoneAuto);
        assert_eq!(hub.zone_status(3).setpoint, 21.0);
        // The schedule walks through every command kind.
        assert!(kinds.contains(&ZoneOff));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_converges_and_cancels_hold() {
        let hub = Arc::new(FakeHub::new().with_zone(5, 20.0, false));
        let (cmd_tx, mut event_rx, handle) = harness(hub.clone(), 5);

        // Let a few ticks pass, then abort early.
        tokio::time::sleep(Duration::from_secs(10)).await;
        cmd_tx.send(SequenceCommand::Abort).await.unwrap();

        let mut aborted_at = None;
        loop {
            let env = event_rx.recv().await.unwrap();
            match env.event {
                RuntimeEvent::SequenceAborted { elapsed, .. } => aborted_at = Some(elapsed),
                RuntimeEvent::SequenceFinished { .. } => break,
                _ => {}
            }
        }
        handle.await.unwrap();

        // Early abort fast-forwards into the monitor tail.
        assert_eq!(aborted_at, Some(195));
        let kinds: Vec<_> = hub.accepted().iter().map(|c| c.kind).collect();
        assert_eq!(*kinds.last().unwrap(), ZoneAuto);
        assert_eq!(hub.zone_status(5).setpoint, 20.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_sequence_returns_zone_to_automatic() {
        let hub = Arc::new(FakeHub::new().with_zone(2, 19.0, true));
        let (cmd_tx, _event_rx, handle) = harness(hub.clone(), 2);

        tokio::time::sleep(Duration::from_secs(20)).await;
        cmd_tx.send(SequenceCommand::Shutdown).await.unwrap();
        handle.await.unwrap();

        let kinds: Vec<_> = hub.accepted().iter().map(|c| c.kind).collect();
        assert_eq!(*kinds.last().unwrap(), ZoneAuto);
        // The zone is back under its own schedule, not stuck forced on.
        assert_eq!(hub.zone_status(2).setpoint, 19.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_command_is_resent() {
        let hub = Arc::new(FakeHub::new().with_zone(1, 21.0, false));
        // Swallow the selection fetch and the tick-0 zone-on.
        hub.fail_next(2);
        let (cmd_tx, _event_rx, handle) = harness(hub.clone(), 1);

        // Within the resend window the zone-on goes out again.
        tokio::time::sleep(Duration::from_secs(7)).await;
        let kinds: Vec<_> = hub.accepted().iter().map(|c| c.kind).collect();
        assert!(kinds.contains(&ZoneOn), "resend never arrived: {:?}", kinds);

        cmd_tx.send(SequenceCommand::Shutdown).await.unwrap();
        handle.await.unwrap();
    }
}
