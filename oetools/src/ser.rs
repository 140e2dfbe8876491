//! Encoding of events in the acquisition application's packed layouts
//!
//! The bridge itself only ever reads these messages; the encoders exist so
//! that fixtures, simulated sources and benches produce byte-exact traffic.

use crate::{Message, SpikeEvent, TtlEvent, SPIKE, TTL};
use anyhow::Result;
use std::io::Write;

/// Write a packed TTL payload
pub fn ttl(wtr: &mut impl Write, ttl: &TtlEvent) -> Result<()> {
    wtr.write_all(&[ttl.node_id, ttl.state as u8, ttl.channel])?;
    Ok(())
}

/// Write a packed spike header followed by raw waveform bytes
pub fn spike(wtr: &mut impl Write, spike: &SpikeEvent, waveform: &[u8]) -> Result<()> {
    wtr.write_all(&spike.timestamp.to_le_bytes())?;
    wtr.write_all(&spike.timestamp_software.to_le_bytes())?;
    for field in [
        spike.sort_source,
        spike.channel_count,
        spike.sample_count,
        spike.sorted_id,
        spike.electrode_id,
        spike.channel,
    ] {
        wtr.write_all(&field.to_le_bytes())?;
    }
    wtr.write_all(waveform)?;
    Ok(())
}

/// Build the message carrying a TTL event at `timestamp` seconds
pub fn ttl_message(event: &TtlEvent, timestamp: f64) -> Message {
    let mut payload = Vec::with_capacity(crate::TTL_LEN);
    // Writing to a Vec cannot fail
    let _ = ttl(&mut payload, event);
    Message { tag: TTL, timestamp, payload }
}

/// Build the message carrying a spike (and its waveform) at `timestamp` seconds
pub fn spike_message(event: &SpikeEvent, waveform: &[u8], timestamp: f64) -> Message {
    let mut payload = Vec::with_capacity(crate::SPIKE_HEADER_LEN + waveform.len());
    let _ = spike(&mut payload, event, waveform);
    Message { tag: SPIKE, timestamp, payload }
}

/// Split a message into its three wire parts: tag, timestamp, payload
pub fn frames(msg: &Message) -> [Vec<u8>; 3] {
    [
        vec![msg.tag],
        msg.timestamp.to_le_bytes().to_vec(),
        msg.payload.clone(),
    ]
}
