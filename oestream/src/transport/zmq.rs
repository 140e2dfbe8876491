use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use zeromq::{Socket, SocketRecv, SubSocket};

use tracing::info;

use super::{message_from_frames, EventSource, Received};
use crate::error::TransportError;

/// ZeroMQ SUB socket on the acquisition application's event publisher.
///
/// The socket lives on a private current-thread runtime that is only driven
/// while one of the methods below blocks on it, so every call happens on the
/// caller's thread.
pub struct ZmqSource {
    runtime: Option<Runtime>,
    socket: Option<SubSocket>,
    filters: Vec<u8>,
    timeout: Duration,
}

impl ZmqSource {
    pub fn new() -> Self {
        ZmqSource {
            runtime: None,
            socket: None,
            filters: Vec::new(),
            timeout: Duration::from_millis(500),
        }
    }
}

impl Default for ZmqSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription topics are byte prefixes; ours are a single ASCII type byte
fn topic(tag: u8) -> Result<String, TransportError> {
    if tag.is_ascii() {
        Ok(char::from(tag).to_string())
    } else {
        Err(TransportError::Subscribe(tag))
    }
}

impl EventSource for ZmqSource {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.runtime.is_none() {
            let rt = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| TransportError::Setup(e.to_string()))?;
            self.runtime = Some(rt);
        }
        Ok(())
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn subscribe(&mut self, tag: u8) -> Result<(), TransportError> {
        let topic = topic(tag)?;
        let rt = self.runtime.as_ref().ok_or(TransportError::NotOpen)?;
        if let Some(socket) = self.socket.as_mut() {
            rt.block_on(socket.subscribe(&topic))
                .map_err(|_| TransportError::Subscribe(tag))?;
        }
        if !self.filters.contains(&tag) {
            self.filters.push(tag);
        }
        Ok(())
    }

    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let rt = self.runtime.as_ref().ok_or(TransportError::NotOpen)?;
        let filters = self.filters.clone();
        let socket = rt.block_on(async move {
            let mut socket = SubSocket::new();
            socket
                .connect(endpoint)
                .await
                .map_err(|e| TransportError::Connect {
                    endpoint: endpoint.to_owned(),
                    reason: e.to_string(),
                })?;
            for tag in filters {
                socket
                    .subscribe(&topic(tag)?)
                    .await
                    .map_err(|_| TransportError::Subscribe(tag))?;
            }
            Ok::<_, TransportError>(socket)
        })?;
        info!("connected to {}", endpoint);
        self.socket = Some(socket);
        Ok(())
    }

    fn disconnect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let rt = self.runtime.as_ref().ok_or(TransportError::NotOpen)?;
        let socket = self.socket.take().ok_or(TransportError::NotConnected)?;
        let errors = rt.block_on(socket.close());
        if errors.is_empty() {
            info!("disconnected from {}", endpoint);
            Ok(())
        } else {
            Err(TransportError::Disconnect {
                endpoint: endpoint.to_owned(),
                reason: errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            })
        }
    }

    fn receive_message(&mut self) -> Received {
        let timeout = self.timeout;
        let (rt, socket) = match (self.runtime.as_ref(), self.socket.as_mut()) {
            (Some(rt), Some(socket)) => (rt, socket),
            (None, _) => return Received::Failed(TransportError::NotOpen),
            (_, None) => return Received::Failed(TransportError::NotConnected),
        };
        match rt.block_on(tokio::time::timeout(timeout, socket.recv())) {
            Err(_) => Received::Timeout,
            Ok(Err(e)) => Received::Failed(TransportError::Receive(e.to_string())),
            Ok(Ok(msg)) => match message_from_frames(&msg.into_vec()) {
                Ok(m) => Received::Message(m),
                Err(e) => Received::Failed(e),
            },
        }
    }
}
