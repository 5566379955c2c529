use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use hearth_core::dispatch::SnapshotSource;
use hearth_core::reducer::{EventEmitter, RuntimeEvent};

/// Periodic full-status poll.
///
/// Fetches the hub's telemetry snapshot on a fixed interval and puts it
/// on the event bus. A failed poll is logged and skipped; the next
/// interval tries again.
pub struct StatusPoller {
    source: Arc<dyn SnapshotSource>,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(source: Arc<dyn SnapshotSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    pub async fn run(self, emitter: EventEmitter) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            match self.source.fetch_snapshot().await {
                Ok(snapshot) => {
                    emitter.emit(RuntimeEvent::SnapshotUpdated { snapshot });
                }
                Err(e) => warn!(error = %e, "status poll failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::broadcast;

    use hearth_core::reducer::EventEnvelope;

    use crate::dispatchers::FakeHub;

    #[tokio::test(start_paused = true)]
    async fn test_poller_emits_snapshots() {
        let hub = Arc::new(FakeHub::new().with_zone(1, 21.0, false));
        let (event_tx, mut event_rx) = broadcast::channel::<EventEnvelope>(64);
        let emitter = EventEmitter::new(event_tx);

        let poller = StatusPoller::new(hub, Duration::from_secs(5));
        let handle = tokio::spawn(poller.run(emitter));

        let mut snapshots = 0;
        while snapshots < 3 {
            let env = event_rx.recv().await.unwrap();
            if let RuntimeEvent::SnapshotUpdated { snapshot } = env.event {
                assert!(snapshot.zones.contains_key(&1));
                snapshots += 1;
            }
        }

        handle.abort();
    }
}
