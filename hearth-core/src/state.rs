use std::collections::BTreeMap;

use crate::model::{HubSnapshot, ZoneId, ZoneStatus};

/// What the console currently shows for one zone.
///
/// `last_seq` is the request sequence number of the rendered status;
/// the reducer uses it to drop replies that arrive out of order.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZoneDisplay {
    pub status: Option<ZoneStatus>,
    pub last_seq: u64,
}

/// Display state of the running (or just finished) reset sequence.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequenceDisplay {
    pub zone: ZoneId,
    pub elapsed: u32,
    pub percent: u8,
    pub aborted: bool,
    pub finished: bool,
}

#[derive(Clone, Debug, Default)]
pub struct RuntimeState {
    pub zones: BTreeMap<ZoneId, ZoneDisplay>,
    pub snapshot: Option<HubSnapshot>,
    pub sequence: Option<SequenceDisplay>,
    pub last_event_id: u64,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered status for a zone, if any reply has been seen.
    pub fn zone_status(&self, zone: ZoneId) -> Option<ZoneStatus> {
        self.zones.get(&zone).and_then(|d| d.status)
    }
}
