use oetools::ConfigError;
use thiserror::Error;

/// Transport failures. Setup errors fail a lifecycle step; receive errors are
/// logged by the processing loop and the iteration is skipped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("unable to set up socket: {0}")]
    Setup(String),

    #[error("socket is not open")]
    NotOpen,

    #[error("socket is not connected")]
    NotConnected,

    #[error("unable to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("unable to disconnect from {endpoint}: {reason}")]
    Disconnect { endpoint: String, reason: String },

    #[error("unable to establish message filter for type {0}")]
    Subscribe(u8),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("partial message: expected 3 parts, got {0}")]
    PartialMessage(usize),

    #[error("timestamp part is not a finite number")]
    NonFiniteTimestamp,

    #[error("malformed {part} part: expected {expected} bytes, got {actual}")]
    MalformedPart {
        part: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Failure of an `initialize`/`start`/`stop` step
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("interface has not been initialized")]
    NotInitialized,

    #[error("event handler thread could not be spawned: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("event handler thread panicked; interface cannot be restarted")]
    WorkerLost,
}
