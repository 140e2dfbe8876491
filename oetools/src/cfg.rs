//! Configuration tools: declaring how the bridge reaches the acquisition
//! application and which digital lines carry the sync code
//!
//! For concreteness, we use [TOML](https://toml.io) as the text file format:
//!
//! ```toml
//! hostname = "127.0.0.1"
//! port = 5557
//! sync_channels = [1, 2, 3]
//! spikes = true
//! sync_interval = "1s"
//! sync_receipt_check_interval = "5s"
//! ```
//!
//! Intervals are parsed as in [humantime](https://docs.rs/humantime/).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::bit::{mask_to_chans, BitOps};
use crate::error::ConfigError;

/// Who authors the sync code
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// The bridge advances and writes the code itself once per sync interval
    Drive,
    /// An upstream source writes the code; the bridge only verifies the echo
    External,
}

impl Default for SyncMode {
    fn default() -> Self {
        SyncMode::Drive
    }
}

/// Interface declaration as written by the operator
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InterfaceConfig {
    pub hostname: String,
    pub port: u16,
    /// 1-indexed digital lines, most significant bit first
    pub sync_channels: Vec<i64>,
    /// Forward spike events to the spike sink
    #[serde(default)]
    pub spikes: bool,
    #[serde(default)]
    pub sync_mode: SyncMode,
    #[serde(default = "default_sync_interval", with = "humantime_serde")]
    pub sync_interval: Duration,
    #[serde(default = "default_receipt_check_interval", with = "humantime_serde")]
    pub sync_receipt_check_interval: Duration,
}

fn default_sync_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_receipt_check_interval() -> Duration {
    Duration::from_secs(5)
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        InterfaceConfig {
            hostname: String::from("127.0.0.1"),
            port: 5557,
            sync_channels: vec![1],
            spikes: false,
            sync_mode: SyncMode::default(),
            sync_interval: default_sync_interval(),
            sync_receipt_check_interval: default_receipt_check_interval(),
        }
    }
}

impl InterfaceConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Read and validate a TOML interface file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config = Self::from_toml_str(&text)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// ZeroMQ endpoint of the acquisition application's event publisher
    pub fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.hostname, self.port)
    }

    pub fn sync_channels(&self) -> Result<SyncChannels, ConfigError> {
        SyncChannels::from_numbers(&self.sync_channels)
    }

    /// Everything that must hold before an interface is built
    pub fn validate(&self) -> Result<SyncChannels, ConfigError> {
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::EmptyHostname);
        }
        if self.sync_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("sync_interval"));
        }
        if self.sync_receipt_check_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("sync_receipt_check_interval"));
        }
        self.sync_channels()
    }
}

/// Ordered, validated set of sync lines (stored 0-indexed).
///
/// Position `i` of `n` carries bit `n - 1 - i` of the sync code, so the first
/// configured line carries the most significant bit. The acquisition
/// application reports lines in configuration order, and the code is only
/// compared once the last configured line (the [trigger
/// channel](SyncChannels::trigger_channel)) has arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncChannels {
    channels: Vec<u8>,
}

impl SyncChannels {
    /// Validate 1-indexed line numbers: non-empty, each in 1..=8, strictly ascending
    pub fn from_numbers(numbers: &[i64]) -> Result<Self, ConfigError> {
        if numbers.is_empty() {
            return Err(ConfigError::NoSyncChannels);
        }
        let mut channels = Vec::with_capacity(numbers.len());
        let mut prev: Option<i64> = None;
        for &n in numbers {
            if !(1..=8).contains(&n) {
                return Err(ConfigError::ChannelOutOfRange(n));
            }
            if let Some(p) = prev {
                if n <= p {
                    return Err(ConfigError::NotAscending { prev: p, next: n });
                }
            }
            prev = Some(n);
            channels.push((n - 1) as u8);
        }
        Ok(SyncChannels { channels })
    }

    /// Number of bits in the sync code
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of distinct codes, `2^n`
    pub fn code_space(&self) -> u32 {
        1 << self.channels.len()
    }

    /// 0-indexed lines in configuration order
    pub fn channels(&self) -> &[u8] {
        &self.channels
    }

    /// Position of a 0-indexed line within the set
    pub fn position(&self, channel: u8) -> Option<usize> {
        self.channels.iter().position(|&c| c == channel)
    }

    /// Code bit carried by the line at `position`
    pub fn bit_for(&self, position: usize) -> usize {
        self.channels.len() - 1 - position
    }

    /// The 0-indexed line whose arrival completes a code
    pub fn trigger_channel(&self) -> u8 {
        self.channels[self.channels.len() - 1]
    }

    /// Level of every sync line (1-indexed) while `code` is being driven
    pub fn line_states(&self, code: u32) -> Vec<(u8, bool)> {
        self.channels
            .iter()
            .enumerate()
            .map(|(i, &c)| (c + 1, code.check(self.bit_for(i))))
            .collect()
    }

    /// Lines (1-indexed) held high while `code` is being driven
    pub fn high_lines(&self, code: u32) -> Vec<u8> {
        let mut mask = 0u8;
        for (line, high) in self.line_states(code) {
            mask.change((line - 1) as usize, high);
        }
        mask_to_chans(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msb_first_mapping() {
        let s = SyncChannels::from_numbers(&[1, 2]).unwrap();
        assert_eq!(s.channels(), &[0, 1]);
        assert_eq!(s.code_space(), 4);
        assert_eq!(s.bit_for(0), 1);
        assert_eq!(s.bit_for(1), 0);
        // Code 1: first line low, second line high
        assert_eq!(s.line_states(1), vec![(1, false), (2, true)]);
        assert_eq!(s.high_lines(1), vec![2]);
        assert_eq!(s.high_lines(2), vec![1]);
        assert_eq!(s.trigger_channel(), 1);
    }

    #[test]
    fn sparse_lines() {
        let s = SyncChannels::from_numbers(&[2, 5, 8]).unwrap();
        assert_eq!(s.position(4), Some(1));
        assert_eq!(s.position(0), None);
        assert_eq!(s.high_lines(0b101), vec![2, 8]);
        assert_eq!(s.trigger_channel(), 7);
    }

    #[test]
    fn endpoint_format() {
        let c = InterfaceConfig {
            hostname: String::from("rig-3.local"),
            port: 5556,
            ..Default::default()
        };
        assert_eq!(c.endpoint(), "tcp://rig-3.local:5556");
    }

    #[test]
    fn zero_interval_rejected() {
        let c = InterfaceConfig {
            sync_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::ZeroInterval("sync_interval")));
    }
}
