//! Wire-level tools for the Open Ephys event stream: event types, the packed
//! binary codec, channel bitmask helpers and interface configuration.

pub mod bit;
pub mod cfg;
pub mod de;
pub mod error;
pub mod ser;

pub use error::{ConfigError, DecodeError};

/// Type tag of a single digital line (TTL) event
pub const TTL: u8 = 3;
/// Type tag of a spike event
pub const SPIKE: u8 = 4;

/// Packed TTL payload: node id, event id (line state), event channel
pub const TTL_LEN: usize = 3;
/// Packed spike header; waveform samples follow on the wire
pub const SPIKE_HEADER_LEN: usize = 28;

/// A single digital line changing state
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct TtlEvent {
    pub node_id: u8,
    /// New level of the line
    pub state: bool,
    /// Line index (0-indexed)
    pub channel: u8,
}

/// Header of a detected spike. Waveform samples are not parsed.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct SpikeEvent {
    /// Acquisition-side sample counter
    pub timestamp: i64,
    pub timestamp_software: i64,
    pub sort_source: u16,
    pub channel_count: u16,
    pub sample_count: u16,
    pub sorted_id: u16,
    pub electrode_id: u16,
    pub channel: u16,
}

/// Decoded event payload
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Event {
    Ttl(TtlEvent),
    Spike(SpikeEvent),
}

/// One 3-part message as published by the acquisition application
#[derive(Clone, PartialEq, Debug)]
pub struct Message {
    pub tag: u8,
    /// Seconds on the acquisition application's clock
    pub timestamp: f64,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn decode(&self) -> Result<Event, DecodeError> {
        de::event(self.tag, &self.payload)
    }
}

/// Convert acquisition-side seconds to whole microseconds, truncating
#[inline]
pub fn secs_to_us(timestamp: f64) -> i64 {
    (timestamp * 1e6) as i64
}
