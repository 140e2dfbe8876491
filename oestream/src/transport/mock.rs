//! Mock event source for testing.
//!
//! Clones share state, so a test can keep a handle while the processing
//! loop owns another: queue messages, inject failures, and inspect what the
//! loop did with the socket.

use oetools::{ser, Message};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::{message_from_frames, EventSource, Received};
use crate::error::TransportError;

/// Longest an empty mock blocks in `receive_message`
const IDLE_POLL: Duration = Duration::from_millis(2);

#[derive(Debug, Default, Clone)]
pub struct MockSource {
    inner: Arc<Mutex<MockSourceInner>>,
}

#[derive(Debug, Default)]
struct MockSourceInner {
    opened: bool,
    connected: Option<String>,
    connects: Vec<String>,
    disconnects: Vec<String>,
    subscriptions: Vec<u8>,
    timeout: Option<Duration>,
    queue: VecDeque<Received>,
    receive_calls: u64,
    fail_open: Option<String>,
    fail_next_connect: Option<String>,
    fail_next_disconnect: Option<String>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for a later `receive_message()`
    pub fn push_message(&self, msg: Message) {
        self.inner.lock().queue.push_back(Received::Message(msg));
    }

    /// Queue raw wire parts, assembled the way a real socket would
    pub fn push_frames(&self, frames: &[Vec<u8>]) {
        let received = match message_from_frames(frames) {
            Ok(m) => Received::Message(m),
            Err(e) => Received::Failed(e),
        };
        self.inner.lock().queue.push_back(received);
    }

    /// Queue a message encoded through the wire layout
    pub fn push_wire(&self, msg: &Message) {
        self.push_frames(&ser::frames(msg));
    }

    pub fn push_failure(&self, error: TransportError) {
        self.inner.lock().queue.push_back(Received::Failed(error));
    }

    /// Messages not yet consumed
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().opened
    }

    pub fn connected_endpoint(&self) -> Option<String> {
        self.inner.lock().connected.clone()
    }

    pub fn connects(&self) -> Vec<String> {
        self.inner.lock().connects.clone()
    }

    pub fn disconnects(&self) -> Vec<String> {
        self.inner.lock().disconnects.clone()
    }

    pub fn subscriptions(&self) -> Vec<u8> {
        self.inner.lock().subscriptions.clone()
    }

    pub fn receive_timeout(&self) -> Option<Duration> {
        self.inner.lock().timeout
    }

    pub fn receive_calls(&self) -> u64 {
        self.inner.lock().receive_calls
    }

    pub fn fail_open(&self, error: &str) {
        self.inner.lock().fail_open = Some(error.to_string());
    }

    pub fn fail_next_connect(&self, error: &str) {
        self.inner.lock().fail_next_connect = Some(error.to_string());
    }

    pub fn fail_next_disconnect(&self, error: &str) {
        self.inner.lock().fail_next_disconnect = Some(error.to_string());
    }
}

impl EventSource for MockSource {
    fn open(&mut self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if let Some(e) = inner.fail_open.take() {
            return Err(TransportError::Setup(e));
        }
        inner.opened = true;
        Ok(())
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.inner.lock().timeout = Some(timeout);
    }

    fn subscribe(&mut self, tag: u8) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if !inner.opened {
            return Err(TransportError::NotOpen);
        }
        if !inner.subscriptions.contains(&tag) {
            inner.subscriptions.push(tag);
        }
        Ok(())
    }

    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if !inner.opened {
            return Err(TransportError::NotOpen);
        }
        if let Some(reason) = inner.fail_next_connect.take() {
            return Err(TransportError::Connect {
                endpoint: endpoint.to_owned(),
                reason,
            });
        }
        inner.connects.push(endpoint.to_owned());
        inner.connected = Some(endpoint.to_owned());
        Ok(())
    }

    fn disconnect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if inner.connected.take().is_none() {
            return Err(TransportError::NotConnected);
        }
        inner.disconnects.push(endpoint.to_owned());
        if let Some(reason) = inner.fail_next_disconnect.take() {
            return Err(TransportError::Disconnect {
                endpoint: endpoint.to_owned(),
                reason,
            });
        }
        Ok(())
    }

    /// Does not apply subscription filters: every queued message is delivered
    fn receive_message(&mut self) -> Received {
        let (next, idle) = {
            let mut inner = self.inner.lock();
            inner.receive_calls += 1;
            let idle = inner.timeout.map_or(IDLE_POLL, |t| t.min(IDLE_POLL));
            (inner.queue.pop_front(), idle)
        };
        match next {
            Some(r) => r,
            None => {
                std::thread::sleep(idle);
                Received::Timeout
            }
        }
    }
}
