use thiserror::Error;

/// Rejected interface configuration. Fatal at construction.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("at least one sync channel is required")]
    NoSyncChannels,

    #[error("invalid sync channel number {0} (must be 1 through 8)")]
    ChannelOutOfRange(i64),

    #[error("sync channels must be strictly ascending ({prev} then {next})")]
    NotAscending { prev: i64, next: i64 },

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("hostname is empty")]
    EmptyHostname,

    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// A message that could not be turned into an `Event`
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("event has unexpected type ({0})")]
    UnrecognizedEventType(u8),

    #[error("event type {tag} needs {expected} payload bytes, got {actual}")]
    PayloadLength {
        tag: u8,
        expected: usize,
        actual: usize,
    },
}
