//! Host clock: the time domain spikes are re-stamped into

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Host-clock time in whole microseconds
pub type HostTime = i64;

pub trait HostClock: Send + Sync {
    fn now_us(&self) -> HostTime;
}

/// Wall clock, microseconds since the UNIX epoch
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl HostClock for SystemClock {
    fn now_us(&self) -> HostTime {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_micros(0))
            .as_micros() as HostTime
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: HostTime) -> Self {
        ManualClock { now: Arc::new(AtomicI64::new(start)) }
    }

    pub fn set(&self, t: HostTime) {
        self.now.store(t, Ordering::SeqCst);
    }

    pub fn advance(&self, d: Duration) {
        self.now.fetch_add(d.as_micros() as HostTime, Ordering::SeqCst);
    }
}

impl HostClock for ManualClock {
    fn now_us(&self) -> HostTime {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: HostClock + ?Sized> HostClock for Arc<C> {
    fn now_us(&self) -> HostTime {
        (**self).now_us()
    }
}

/// Convert an interval to host-clock microseconds
#[inline]
pub fn interval_us(d: Duration) -> HostTime {
    d.as_micros() as HostTime
}
