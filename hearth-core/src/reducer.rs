use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use tokio::sync::broadcast;

use crate::command::CommandKind;
use crate::model::{HubSnapshot, ZoneId, ZoneStatus};
use crate::state::RuntimeState;

#[derive(Clone, Debug)]
pub enum RuntimeEvent {
    /// A reply to a status request arrived. `request_seq` is the
    /// monotonic number the request was tagged with when it was sent;
    /// replies arriving out of order are dropped by the reducer. A
    /// `None` status means the reply was malformed and the zone renders
    /// as unknown.
    ZoneStatusUpdated {
        zone: ZoneId,
        status: Option<ZoneStatus>,
        request_seq: u64,
    },
    /// A fresh full telemetry snapshot from the status poll.
    SnapshotUpdated { snapshot: HubSnapshot },
    /// A command went out on the wire.
    CommandDispatched {
        zone: ZoneId,
        kind: CommandKind,
        forced: bool,
    },
    /// The running sequence advanced.
    SequenceProgress {
        zone: ZoneId,
        elapsed: u32,
        percent: u8,
    },
    /// The sequence reached its terminal tick and halted.
    SequenceFinished { zone: ZoneId },
    /// A user abort was accepted.
    SequenceAborted { zone: ZoneId, elapsed: u32 },
}

#[derive(Clone, Debug)]
pub struct EventEnvelope {
    pub id: u64,
    pub at: SystemTime,
    pub event: RuntimeEvent,
}

/// Stamps events with a shared monotonic id and puts them on the bus.
///
/// Clones share the counter, so tasks spawned off the tick loop (status
/// reply forwarding, the poller) keep ids unique across the process.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<EventEnvelope>,
    next_id: Arc<AtomicU64>,
}

impl EventEmitter {
    pub fn new(tx: broadcast::Sender<EventEnvelope>) -> Self {
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn emit(&self, event: RuntimeEvent) {
        let _ = self.tx.send(EventEnvelope {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            at: SystemTime::now(),
            event,
        });
    }
}

pub fn reduce(state: &mut RuntimeState, env: &EventEnvelope) {
    state.last_event_id = env.id;

    match &env.event {
        RuntimeEvent::ZoneStatusUpdated {
            zone,
            status,
            request_seq,
        } => {
            let display = state.zones.entry(*zone).or_default();
            // Replies to older requests lose to whatever is already
            // rendered.
            if *request_seq > display.last_seq {
                display.last_seq = *request_seq;
                display.status = *status;
            }
        }
        RuntimeEvent::SnapshotUpdated { snapshot } => {
            state.snapshot = Some(snapshot.clone());
        }
        RuntimeEvent::SequenceProgress {
            zone,
            elapsed,
            percent,
        } => {
            let seq = state.sequence.get_or_insert_default();
            seq.zone = *zone;
            seq.elapsed = *elapsed;
            seq.percent = *percent;
        }
        RuntimeEvent::SequenceAborted { zone, elapsed } => {
            let seq = state.sequence.get_or_insert_default();
            seq.zone = *zone;
            seq.elapsed = *elapsed;
            seq.aborted = true;
        }
        RuntimeEvent::SequenceFinished { zone } => {
            if let Some(seq) = state.sequence.as_mut() {
                if seq.zone == *zone {
                    seq.finished = true;
                    seq.percent = 100;
                }
            }
        }
        RuntimeEvent::CommandDispatched { .. } => {}
    }
}
