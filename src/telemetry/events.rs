use crate::error::StopReason;
use std::fmt;
use std::time::Duration;

/// State-transition events emitted by a sink's main loop.
///
/// Events describe what the reconnect loop is doing. They never affect delivery, and a sink
/// with a [`NullSink`](super::NullSink) behaves exactly like one with a recording sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// Waiting out the backoff before the next connect or receive.
    BackingOff {
        /// The wait actually applied, after jitter
        delay: Duration,
    },
    /// Dialing the drain.
    Connecting {
        /// Failed attempts so far
        attempt: usize,
    },
    /// The drain accepted the connection.
    Connected,
    /// Dialing failed; the loop will back off.
    ConnectFailed {
        /// Failed attempts including this one
        attempt: usize,
        /// The nominal backoff before the next try
        backoff: Duration,
    },
    /// One envelope was written.
    Sent {
        bytes: usize,
    },
    /// A write failed; the connection is treated as dead.
    SendFailed {
        /// Failed attempts including this one
        attempt: usize,
    },
    /// The loop exited.
    Stopped {
        reason: StopReason,
    },
}

impl SinkEvent {
    /// Short machine-friendly name, used as a metric label or JSON `kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            SinkEvent::BackingOff { .. } => "backing_off",
            SinkEvent::Connecting { .. } => "connecting",
            SinkEvent::Connected => "connected",
            SinkEvent::ConnectFailed { .. } => "connect_failed",
            SinkEvent::Sent { .. } => "sent",
            SinkEvent::SendFailed { .. } => "send_failed",
            SinkEvent::Stopped { .. } => "stopped",
        }
    }

    /// JSON form of the event for line-oriented sinks.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            SinkEvent::BackingOff { delay } => {
                json!({ "kind": self.kind(), "delay_ms": clamp_u64(delay.as_millis()) })
            }
            SinkEvent::Connecting { attempt } => json!({ "kind": self.kind(), "attempt": attempt }),
            SinkEvent::Connected => json!({ "kind": self.kind() }),
            SinkEvent::ConnectFailed { attempt, backoff } => json!({
                "kind": self.kind(),
                "attempt": attempt,
                "backoff_ms": clamp_u64(backoff.as_millis()),
            }),
            SinkEvent::Sent { bytes } => json!({ "kind": self.kind(), "bytes": bytes }),
            SinkEvent::SendFailed { attempt } => json!({ "kind": self.kind(), "attempt": attempt }),
            SinkEvent::Stopped { reason } => {
                json!({ "kind": self.kind(), "reason": reason.to_string() })
            }
        }
    }
}

#[inline]
fn clamp_u64(val: u128) -> u64 {
    val.min(u128::from(u64::MAX)) as u64
}

impl fmt::Display for SinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkEvent::BackingOff { delay } => write!(f, "BackingOff(delay={:?})", delay),
            SinkEvent::Connecting { attempt } => write!(f, "Connecting(attempt={})", attempt),
            SinkEvent::Connected => write!(f, "Connected"),
            SinkEvent::ConnectFailed { attempt, backoff } => {
                write!(f, "ConnectFailed(attempt={}, backoff={:?})", attempt, backoff)
            }
            SinkEvent::Sent { bytes } => write!(f, "Sent(bytes={})", bytes),
            SinkEvent::SendFailed { attempt } => write!(f, "SendFailed(attempt={})", attempt),
            SinkEvent::Stopped { reason } => write!(f, "Stopped({})", reason),
        }
    }
}
