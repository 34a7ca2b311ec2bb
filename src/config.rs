//! Sink configuration.
//!
//! Whatever constructs sinks owns one validated [`SinkConfig`] and passes it in; nothing here
//! reads process-global state. Every field has a default, so an empty JSON object is a valid
//! configuration.

use crate::backoff::{Backoff, BackoffError};
use crate::jitter::{InvalidJitterRatio, Jitter};
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse sink config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Need max number of log messages to retain per application")]
    ZeroBufferCapacity,
    #[error("backoff base must be greater than zero")]
    ZeroBackoffBase,
    #[error("invalid IP range {start} - {end}: {reason}")]
    InvalidIpRange { start: IpAddr, end: IpAddr, reason: &'static str },
    #[error(transparent)]
    Backoff(#[from] BackoffError),
    #[error(transparent)]
    Jitter(#[from] InvalidJitterRatio),
}

/// Inclusive range of addresses a drain must not resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IpRange {
    pub start: IpAddr,
    pub end: IpAddr,
}

impl IpRange {
    pub fn new(start: IpAddr, end: IpAddr) -> Self {
        Self { start, end }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let reason = match (self.start, self.end) {
            (IpAddr::V4(_), IpAddr::V6(_)) | (IpAddr::V6(_), IpAddr::V4(_)) => {
                "start and end must be the same address family"
            }
            (start, end) if start > end => "start must not be after end",
            _ => return Ok(()),
        };
        Err(ConfigError::InvalidIpRange { start: self.start, end: self.end, reason })
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.start, self.end, addr) {
            (IpAddr::V4(s), IpAddr::V4(e), IpAddr::V4(a)) => s <= a && a <= e,
            (IpAddr::V6(s), IpAddr::V6(e), IpAddr::V6(a)) => s <= a && a <= e,
            _ => false,
        }
    }
}

/// Which jitter the sink applies to its backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterKind {
    #[default]
    None,
    Full,
    Equal,
    Proportional,
}

/// Settings shared by every sink a process creates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Envelopes retained per sink before the oldest are dropped.
    pub buffer_capacity: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub jitter: JitterKind,
    /// Spread used by `JitterKind::Proportional`.
    pub jitter_ratio: f64,
    /// HOSTNAME field written into syslog frames.
    pub hostname: String,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub blacklist_ips: Vec<IpRange>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: crate::buffer::DEFAULT_CAPACITY,
            backoff_base_ms: crate::backoff::DEFAULT_BASE.as_millis() as u64,
            backoff_max_ms: crate::backoff::DEFAULT_MAX.as_millis() as u64,
            jitter: JitterKind::None,
            jitter_ratio: 0.1,
            hostname: "drainpipe".to_string(),
            connect_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
            blacklist_ips: Vec::new(),
        }
    }
}

impl SinkConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SinkConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::ZeroBufferCapacity);
        }
        // A zero base would skip the wait before every connect.
        if self.backoff_base_ms == 0 {
            return Err(ConfigError::ZeroBackoffBase);
        }
        for range in &self.blacklist_ips {
            range.validate()?;
        }
        self.backoff()?;
        self.jitter()?;
        Ok(())
    }

    pub fn backoff(&self) -> Result<Backoff, BackoffError> {
        Backoff::exponential(Duration::from_millis(self.backoff_base_ms))
            .with_max(Duration::from_millis(self.backoff_max_ms))
    }

    pub fn jitter(&self) -> Result<Jitter, InvalidJitterRatio> {
        match self.jitter {
            JitterKind::None => Ok(Jitter::None),
            JitterKind::Full => Ok(Jitter::Full),
            JitterKind::Equal => Ok(Jitter::Equal),
            JitterKind::Proportional => Jitter::proportional(self.jitter_ratio),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn is_blacklisted(&self, addr: IpAddr) -> bool {
        self.blacklist_ips.iter().any(|range| range.contains(addr))
    }
}
