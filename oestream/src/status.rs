//! Counters describing how synchronization and delivery are going.
//! Written by the processing loop, read from anywhere.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    inner: Arc<StatusInner>,
}

#[derive(Debug, Default)]
struct StatusInner {
    drives: AtomicU64,
    matches: AtomicU64,
    mismatches: AtomicU64,
    stalls: AtomicU64,
    spikes: AtomicU64,
    decode_errors: AtomicU64,
    unrecognized: AtomicU64,
    transport_errors: AtomicU64,
    sent_code: AtomicU32,
}

/// Point-in-time copy of `SyncStatus`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub drives: u64,
    pub matches: u64,
    pub mismatches: u64,
    pub stalls: u64,
    pub spikes: u64,
    pub decode_errors: u64,
    pub unrecognized: u64,
    pub transport_errors: u64,
    pub sent_code: u32,
}

impl SyncStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let i = &self.inner;
        StatusSnapshot {
            drives: i.drives.load(Ordering::Relaxed),
            matches: i.matches.load(Ordering::Relaxed),
            mismatches: i.mismatches.load(Ordering::Relaxed),
            stalls: i.stalls.load(Ordering::Relaxed),
            spikes: i.spikes.load(Ordering::Relaxed),
            decode_errors: i.decode_errors.load(Ordering::Relaxed),
            unrecognized: i.unrecognized.load(Ordering::Relaxed),
            transport_errors: i.transport_errors.load(Ordering::Relaxed),
            sent_code: i.sent_code.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        let i = &self.inner;
        for c in [
            &i.drives,
            &i.matches,
            &i.mismatches,
            &i.stalls,
            &i.spikes,
            &i.decode_errors,
            &i.unrecognized,
            &i.transport_errors,
        ] {
            c.store(0, Ordering::Relaxed);
        }
        i.sent_code.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self, code: u32, driven: bool) {
        if driven {
            self.inner.drives.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.sent_code.store(code, Ordering::Relaxed);
    }

    pub(crate) fn record_match(&self) {
        self.inner.matches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_mismatch(&self) {
        self.inner.mismatches.fetch_add(1, Ordering::Relaxed);
        self.inner.sent_code.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_stall(&self) {
        self.inner.stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_spike(&self) {
        self.inner.spikes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_error(&self) {
        self.inner.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unrecognized(&self) {
        self.inner.unrecognized.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transport_error(&self) {
        self.inner.transport_errors.fetch_add(1, Ordering::Relaxed);
    }
}
