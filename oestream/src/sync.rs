//! Clock synchronization with the acquisition application.
//!
//! The host writes a multi-bit code onto the sync lines once per sync
//! interval. The acquisition application timestamps each line change on its
//! own clock and publishes it back as a TTL event. Once the last configured
//! line has been reported, the reconstructed code is compared with the one
//! that was sent; on a match, the difference between the host time the code
//! was written and the remote time it was observed becomes the clock offset.
//! On a mismatch the cycle starts over from code zero.

use oetools::bit::BitOps;
use oetools::cfg::SyncChannels;
use oetools::{secs_to_us, TtlEvent};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::clock::{interval_us, HostClock, HostTime};
use crate::status::SyncStatus;

/// Host-side mechanism that puts a code on the sync lines.
/// The new levels must be observable downstream when `set_value` returns.
pub trait DigitalOutput: Send {
    fn set_value(&mut self, code: u32);
}

impl<F> DigitalOutput for F
where
    F: FnMut(u32) + Send,
{
    fn set_value(&mut self, code: u32) {
        self(code)
    }
}

/// Additive correction from acquisition-side to host time, in microseconds:
/// `host = remote + offset`. Clones share the same value.
#[derive(Debug, Clone, Default)]
pub struct ClockOffset {
    inner: Arc<OffsetInner>,
}

#[derive(Debug, Default)]
struct OffsetInner {
    offset: AtomicI64,
    updates: AtomicU64,
}

impl ClockOffset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> i64 {
        self.inner.offset.load(Ordering::Acquire)
    }

    /// Number of verified matches that produced this value
    pub fn updates(&self) -> u64 {
        self.inner.updates.load(Ordering::Acquire)
    }

    pub fn is_established(&self) -> bool {
        self.updates() > 0
    }

    /// Saturates at the ends of the `i64` range
    pub fn to_host(&self, remote_us: i64) -> HostTime {
        remote_us.saturating_add(self.get())
    }

    pub(crate) fn publish(&self, offset: i64) {
        self.inner.offset.store(offset, Ordering::Release);
        self.inner.updates.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn reset(&self) {
        self.inner.offset.store(0, Ordering::Release);
        self.inner.updates.store(0, Ordering::Release);
    }
}

/// Host times of the current cycle. `last_sent_time == 0` means no code is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTiming {
    pub last_sent_time: HostTime,
    pub last_received_time: HostTime,
    pub last_receipt_check_time: HostTime,
}

/// What a TTL event did to the cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Not a sync line
    Ignored,
    /// One bit recorded; the code is not complete yet
    Partial,
    /// Code completed while no code was in flight
    Idle,
    Matched { offset: i64 },
    Mismatched { sent: u32, received: u32 },
}

pub struct SyncEngine {
    channels: SyncChannels,
    sent: u32,
    received: u32,
    timing: SyncTiming,
    sync_interval: HostTime,
    receipt_check_interval: HostTime,
    offset: ClockOffset,
    status: SyncStatus,
}

impl SyncEngine {
    /// Start a fresh cycle. The stall window opens at `now`.
    pub fn new(
        channels: SyncChannels,
        sync_interval: Duration,
        receipt_check_interval: Duration,
        now: HostTime,
    ) -> Self {
        SyncEngine {
            channels,
            sent: 0,
            received: 0,
            timing: SyncTiming {
                last_sent_time: 0,
                last_received_time: now,
                last_receipt_check_time: now,
            },
            sync_interval: interval_us(sync_interval),
            receipt_check_interval: interval_us(receipt_check_interval),
            offset: ClockOffset::new(),
            status: SyncStatus::new(),
        }
    }

    /// Publish into shared handles instead of private ones
    pub fn with_handles(mut self, offset: ClockOffset, status: SyncStatus) -> Self {
        self.offset = offset;
        self.status = status;
        self
    }

    pub fn channels(&self) -> &SyncChannels {
        &self.channels
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn timing(&self) -> SyncTiming {
        self.timing
    }

    pub fn offset(&self) -> &ClockOffset {
        &self.offset
    }

    pub fn drive_due(&self, now: HostTime) -> bool {
        self.timing.last_sent_time == 0 || now - self.timing.last_sent_time >= self.sync_interval
    }

    /// Advance and write the next code if the sync interval has elapsed.
    /// The send time is read after the write returns.
    pub fn drive(&mut self, output: &mut dyn DigitalOutput, clock: &dyn HostClock) -> Option<u32> {
        if !self.drive_due(clock.now_us()) {
            return None;
        }
        self.sent = (self.sent + 1) % self.channels.code_space();
        output.set_value(self.sent);
        self.timing.last_sent_time = clock.now_us();
        self.status.record_sent(self.sent, true);
        debug!(
            "sent sync code {} (high lines {:?})",
            self.sent,
            self.channels.high_lines(self.sent)
        );
        Some(self.sent)
    }

    /// Adopt a code written by an upstream source at host time `time`
    pub fn accept_external(&mut self, value: u32, time: HostTime) {
        if value >= self.channels.code_space() {
            warn!(
                "external sync value {} does not fit on {} sync lines",
                value,
                self.channels.len()
            );
        }
        self.sent = value;
        self.timing.last_sent_time = time;
        self.status.record_sent(value, false);
        debug!("external sync code {} set at {}", value, time);
    }

    /// Record one line change reported by the acquisition application.
    /// `remote_seconds` is the event's timestamp on the acquisition clock.
    pub fn receive(&mut self, ttl: &TtlEvent, remote_seconds: f64, now: HostTime) -> SyncOutcome {
        let position = match self.channels.position(ttl.channel) {
            Some(p) => p,
            None => return SyncOutcome::Ignored,
        };
        self.received.change(self.channels.bit_for(position), ttl.state);

        if ttl.channel != self.channels.trigger_channel() {
            return SyncOutcome::Partial;
        }

        self.timing.last_received_time = now;
        self.timing.last_receipt_check_time = now;

        if self.timing.last_sent_time == 0 {
            debug!("sync code {} completed with no code in flight", self.received);
            self.received = 0;
            return SyncOutcome::Idle;
        }

        if self.received == self.sent {
            let offset = self
                .timing
                .last_sent_time
                .saturating_sub(secs_to_us(remote_seconds));
            self.offset.publish(offset);
            self.status.record_match();
            debug!("sync code {} matched; clock offset {} us", self.sent, offset);
            SyncOutcome::Matched { offset }
        } else {
            error!(
                "Open Ephys clock sync values don't match: sent {}, received {}",
                self.sent, self.received
            );
            let outcome = SyncOutcome::Mismatched {
                sent: self.sent,
                received: self.received,
            };
            self.reset();
            self.status.record_mismatch();
            outcome
        }
    }

    /// Report a stall at most once per receipt check interval.
    /// Returns the time since the last completed code when one is reported.
    pub fn check_stall(&mut self, now: HostTime) -> Option<HostTime> {
        if now - self.timing.last_receipt_check_time < self.receipt_check_interval {
            return None;
        }
        self.timing.last_receipt_check_time = now;
        let elapsed = now - self.timing.last_received_time;
        if elapsed < self.receipt_check_interval {
            return None;
        }
        error!(
            "No Open Ephys clock sync received after {:.0} seconds",
            elapsed as f64 / 1e6
        );
        self.status.record_stall();
        Some(elapsed)
    }

    /// Forget the cycle; the next drive step starts again from code one
    fn reset(&mut self) {
        self.sent = 0;
        self.received = 0;
        self.timing.last_sent_time = 0;
    }
}
