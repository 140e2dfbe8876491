//! Decoding of packed event payloads
//!
//! Both layouts are fixed, tightly packed and little-endian, as written by the
//! acquisition application. Bytes past the documented fields (TTL extras, spike
//! waveform samples) are left untouched.

use crate::error::DecodeError;
use crate::{Event, SpikeEvent, TtlEvent, SPIKE, SPIKE_HEADER_LEN, TTL, TTL_LEN};

/// Decode the payload of a message with the given type tag
pub fn event(tag: u8, payload: &[u8]) -> Result<Event, DecodeError> {
    match tag {
        TTL => ttl(payload).map(Event::Ttl),
        SPIKE => spike(payload).map(Event::Spike),
        other => Err(DecodeError::UnrecognizedEventType(other)),
    }
}

/// `{node_id: u8, event_id: u8, event_channel: u8}`
pub fn ttl(payload: &[u8]) -> Result<TtlEvent, DecodeError> {
    let b = header(TTL, payload, TTL_LEN)?;
    Ok(TtlEvent {
        node_id: b[0],
        state: b[1] != 0,
        channel: b[2],
    })
}

/// `{timestamp: i64, timestamp_software: i64, sort_source: u16,
/// channel_count: u16, sample_count: u16, sorted_id: u16, electrode_id: u16,
/// channel: u16}` followed by waveform samples
pub fn spike(payload: &[u8]) -> Result<SpikeEvent, DecodeError> {
    let b = header(SPIKE, payload, SPIKE_HEADER_LEN)?;
    Ok(SpikeEvent {
        timestamp: i64_at(b, 0),
        timestamp_software: i64_at(b, 8),
        sort_source: u16_at(b, 16),
        channel_count: u16_at(b, 18),
        sample_count: u16_at(b, 20),
        sorted_id: u16_at(b, 22),
        electrode_id: u16_at(b, 24),
        channel: u16_at(b, 26),
    })
}

fn header(tag: u8, payload: &[u8], len: usize) -> Result<&[u8], DecodeError> {
    payload.get(..len).ok_or(DecodeError::PayloadLength {
        tag,
        expected: len,
        actual: payload.len(),
    })
}

#[inline]
fn i64_at(b: &[u8], at: usize) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&b[at..at + 8]);
    i64::from_le_bytes(buf)
}

#[inline]
fn u16_at(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}
