//! Transport abstraction for the acquisition application's event stream.
//!
//! A source delivers logical 3-part messages `{tag, timestamp, payload}`
//! from a publish/subscribe channel. A receive timeout is not an error: it is
//! how the processing loop regains control for housekeeping and cancellation.

mod mock;
mod zmq;

pub use mock::MockSource;
pub use zmq::ZmqSource;

use oetools::Message;
use std::time::Duration;

use crate::error::TransportError;

/// Outcome of one timed receive
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Message(Message),
    Timeout,
    Failed(TransportError),
}

/// Subscriber side of the acquisition application's event publisher
pub trait EventSource: Send {
    /// Create the socket and its context
    fn open(&mut self) -> Result<(), TransportError>;

    /// Upper bound on how long `receive_message` blocks
    fn set_receive_timeout(&mut self, timeout: Duration);

    /// Receive messages whose first part equals `tag`. Filters are additive.
    fn subscribe(&mut self, tag: u8) -> Result<(), TransportError>;

    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError>;

    fn disconnect(&mut self, endpoint: &str) -> Result<(), TransportError>;

    fn receive_message(&mut self) -> Received;
}

/// Assemble a message from its wire parts: 1-byte tag, 8-byte double, payload
pub fn message_from_frames<B: AsRef<[u8]>>(frames: &[B]) -> Result<Message, TransportError> {
    let (tag, timestamp, payload) = match frames {
        [tag, timestamp, payload] => (tag.as_ref(), timestamp.as_ref(), payload.as_ref()),
        _ => return Err(TransportError::PartialMessage(frames.len())),
    };
    if tag.len() != 1 {
        return Err(TransportError::MalformedPart {
            part: "type",
            expected: 1,
            actual: tag.len(),
        });
    }
    let mut ts = [0u8; 8];
    if timestamp.len() != ts.len() {
        return Err(TransportError::MalformedPart {
            part: "timestamp",
            expected: 8,
            actual: timestamp.len(),
        });
    }
    ts.copy_from_slice(timestamp);
    let timestamp = f64::from_le_bytes(ts);
    if !timestamp.is_finite() {
        return Err(TransportError::NonFiniteTimestamp);
    }
    Ok(Message {
        tag: tag[0],
        timestamp,
        payload: payload.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use oetools::{ser, TtlEvent, TTL};

    #[test]
    fn frames_roundtrip_through_wire_layout() {
        let msg = ser::ttl_message(&TtlEvent { node_id: 0, state: true, channel: 1 }, 3.25);
        let frames = ser::frames(&msg);
        assert_eq!(message_from_frames(&frames), Ok(msg));
    }

    #[test]
    fn partial_message() {
        let frames = vec![vec![TTL], 1.0f64.to_le_bytes().to_vec()];
        assert_eq!(
            message_from_frames(&frames),
            Err(TransportError::PartialMessage(2))
        );
        let none: Vec<Vec<u8>> = Vec::new();
        assert_eq!(
            message_from_frames(&none),
            Err(TransportError::PartialMessage(0))
        );
    }

    #[test]
    fn malformed_parts() {
        let frames = vec![vec![TTL, 0], vec![0; 8], vec![0; 3]];
        assert_eq!(
            message_from_frames(&frames),
            Err(TransportError::MalformedPart { part: "type", expected: 1, actual: 2 })
        );
        let frames = vec![vec![TTL], vec![0; 4], vec![0; 3]];
        assert_eq!(
            message_from_frames(&frames),
            Err(TransportError::MalformedPart { part: "timestamp", expected: 8, actual: 4 })
        );
    }

    #[test]
    fn non_finite_timestamps_rejected() {
        for t in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let frames = vec![vec![TTL], t.to_le_bytes().to_vec(), vec![0; 3]];
            assert_eq!(
                message_from_frames(&frames),
                Err(TransportError::NonFiniteTimestamp)
            );
        }
        let frames = vec![vec![TTL], f64::MAX.to_le_bytes().to_vec(), vec![0; 3]];
        assert_eq!(message_from_frames(&frames).unwrap().timestamp, f64::MAX);
    }
}
