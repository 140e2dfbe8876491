//! Re-stamping spikes into host time and handing them to the host

use oetools::{secs_to_us, SpikeEvent};
use serde::Serialize;
use tracing::debug;

use crate::clock::HostTime;
use crate::status::SyncStatus;
use crate::sync::ClockOffset;

/// Spike as stored by the host. Serializes to a map with the keys
/// `oe_timestamp`, `sorted_id`, `electrode_id` and `channel`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpikeRecord {
    /// Acquisition-side sample counter
    pub oe_timestamp: i64,
    pub sorted_id: u16,
    pub electrode_id: u16,
    pub channel: u16,
}

impl From<&SpikeEvent> for SpikeRecord {
    fn from(s: &SpikeEvent) -> Self {
        SpikeRecord {
            oe_timestamp: s.timestamp,
            sorted_id: s.sorted_id,
            electrode_id: s.electrode_id,
            channel: s.channel,
        }
    }
}

/// Host collaborator that stores spike records at a host timestamp
pub trait SpikeSink: Send {
    fn publish(&mut self, record: SpikeRecord, host_time: HostTime);
}

impl<F> SpikeSink for F
where
    F: FnMut(SpikeRecord, HostTime) + Send,
{
    fn publish(&mut self, record: SpikeRecord, host_time: HostTime) {
        self(record, host_time)
    }
}

pub struct Dispatcher {
    sink: Box<dyn SpikeSink>,
    offset: ClockOffset,
    status: SyncStatus,
    warned_unsynced: bool,
}

impl Dispatcher {
    pub fn new(sink: Box<dyn SpikeSink>, offset: ClockOffset, status: SyncStatus) -> Self {
        Dispatcher {
            sink,
            offset,
            status,
            warned_unsynced: false,
        }
    }

    /// Forward one spike, returning the host time it was stamped with.
    /// Before the first verified sync code the offset is zero and the
    /// acquisition-side time is forwarded as is.
    pub fn dispatch(&mut self, spike: &SpikeEvent, remote_seconds: f64) -> HostTime {
        if !self.offset.is_established() && !self.warned_unsynced {
            debug!("forwarding spikes before the first clock sync; timestamps are uncorrected");
            self.warned_unsynced = true;
        }
        let host_time = self.offset.to_host(secs_to_us(remote_seconds));
        self.sink.publish(SpikeRecord::from(spike), host_time);
        self.status.record_spike();
        host_time
    }

    /// Forget that the uncorrected-spike notice was already given
    pub(crate) fn rearm(&mut self) {
        self.warned_unsynced = false;
    }
}
