#![allow(dead_code)]

use oestream::{HostTime, ManualClock, MockSource, SpikeRecord};
use oetools::cfg::InterfaceConfig;
use oetools::{ser, Message, TtlEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const START: HostTime = 1_000_000_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn config(channels: &[i64]) -> InterfaceConfig {
    InterfaceConfig {
        hostname: String::from("127.0.0.1"),
        port: 5557,
        sync_channels: channels.to_vec(),
        spikes: true,
        sync_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

/// Collaborators shared between a test and the interface under test
pub struct Harness {
    pub source: MockSource,
    pub clock: ManualClock,
    pub written: Arc<Mutex<Vec<u32>>>,
    pub spikes: Arc<Mutex<Vec<(SpikeRecord, HostTime)>>>,
}

impl Harness {
    pub fn new() -> Self {
        Harness {
            source: MockSource::new(),
            clock: ManualClock::new(START),
            written: Arc::new(Mutex::new(Vec::new())),
            spikes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn output(&self) -> impl FnMut(u32) + Send + 'static {
        let w = self.written.clone();
        move |code: u32| w.lock().push(code)
    }

    pub fn sink(&self) -> impl FnMut(SpikeRecord, HostTime) + Send + 'static {
        let s = self.spikes.clone();
        move |r: SpikeRecord, t: HostTime| s.lock().push((r, t))
    }

    /// Queue the TTL events the acquisition application would report for
    /// `code` on `channels` (1-indexed), most significant bit first
    pub fn echo(&self, channels: &[u8], code: u32, remote_seconds: f64) {
        let n = channels.len();
        for (i, &ch) in channels.iter().enumerate() {
            let state = (code >> (n - 1 - i)) & 1 == 1;
            let ttl = TtlEvent { node_id: 0, state, channel: ch - 1 };
            self.source.push_wire(&ser::ttl_message(&ttl, remote_seconds));
        }
    }

    pub fn push(&self, msg: Message) {
        self.source.push_wire(&msg);
    }
}

/// Poll until `f` holds, panicking after a generous deadline
pub fn wait_for(what: &str, mut f: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !f() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
