//! Error types for drain sinks.
//!
//! Transport failures ([`DrainError`]) never leave the sink: the worker reports them and backs
//! off. Only construction can fail outward ([`SinkError`]). Termination is not an error either;
//! [`StopReason`] says why `run` returned.
use crate::backoff::BackoffError;
use crate::config::ConfigError;
use std::fmt;
use std::io;
use std::net::IpAddr;
use std::time::Duration;

/// Failure raised by a [`DrainWriter`](crate::writer::DrainWriter).
#[derive(Debug, thiserror::Error)]
pub enum DrainError {
    /// The drain URL could not be turned into a dialable address
    #[error("invalid drain url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Dialing the drain failed
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },
    /// Dialing the drain took longer than the configured timeout
    #[error("connecting to {target} timed out after {timeout:?}")]
    ConnectTimeout { target: String, timeout: Duration },
    /// The drain resolved to an address inside a blacklisted range
    #[error("drain address {addr} is blacklisted")]
    Blacklisted { addr: IpAddr },
    /// A write was attempted without a live connection
    #[error("not connected")]
    NotConnected,
    /// The connection failed while writing
    #[error("write failed: {source}")]
    Write {
        #[source]
        source: io::Error,
    },
    /// A write took longer than the configured timeout
    #[error("write timed out after {timeout:?}")]
    WriteTimeout { timeout: Duration },
    /// Failure injected by a test double
    #[error("{0}")]
    Scripted(String),
}

impl DrainError {
    /// The transport could not establish a session.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. }
                | Self::Connect { .. }
                | Self::ConnectTimeout { .. }
                | Self::Blacklisted { .. }
        )
    }

    /// A session existed but writing to it failed.
    pub fn is_send_failure(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Write { .. } | Self::WriteTimeout { .. })
    }
}

/// Errors building a sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("a drain writer is required")]
    MissingWriter,
    #[error("invalid drain writer: {0}")]
    Writer(#[from] DrainError),
    #[error("invalid backoff: {0}")]
    Backoff(#[from] BackoffError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why a sink's `run` returned. Neither variant is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `disconnect` was called
    Disconnected,
    /// The feed ended and the buffer was drained
    UpstreamClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Disconnected => f.write_str("disconnected"),
            StopReason::UpstreamClosed => f.write_str("upstream closed"),
        }
    }
}
