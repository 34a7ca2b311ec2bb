//! Registry-facing view of a running sink.

use crate::instrumentation::Metric;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The (application, drain) pair a sink delivers for. Fixed for the sink's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SinkIdentity {
    app_id: String,
    drain_url: String,
}

impl SinkIdentity {
    pub fn new(app_id: impl Into<String>, drain_url: impl Into<String>) -> Self {
        Self { app_id: app_id.into(), drain_url: drain_url.into() }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn drain_url(&self) -> &str {
        &self.drain_url
    }
}

impl fmt::Display for SinkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (app {})", self.drain_url, self.app_id)
    }
}

/// Where the main loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SinkState {
    Idle = 0,
    Backoff = 1,
    Connecting = 2,
    WaitingForMessage = 3,
    Sending = 4,
    Disconnected = 5,
}

impl SinkState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SinkState::Backoff,
            2 => SinkState::Connecting,
            3 => SinkState::WaitingForMessage,
            4 => SinkState::Sending,
            5 => SinkState::Disconnected,
            _ => SinkState::Idle,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SinkState::Disconnected)
    }
}

impl fmt::Display for SinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SinkState::Idle => "idle",
            SinkState::Backoff => "backoff",
            SinkState::Connecting => "connecting",
            SinkState::WaitingForMessage => "waiting_for_message",
            SinkState::Sending => "sending",
            SinkState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// State shared between the worker, its filter task, and every handle.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) identity: SinkIdentity,
    pub(crate) disconnect: CancellationToken,
    dropped: AtomicU64,
    sent: AtomicU64,
    state: AtomicU8,
}

impl Shared {
    pub(crate) fn new(identity: SinkIdentity) -> Self {
        Self {
            identity,
            disconnect: CancellationToken::new(),
            dropped: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            state: AtomicU8::new(SinkState::Idle as u8),
        }
    }

    /// Wrapping add, matching the counter's documented overflow behavior.
    pub(crate) fn add_dropped(&self, count: u64) {
        if count != 0 {
            self.dropped.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_state(&self, state: SinkState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// What the sink registry needs from any sink kind.
pub trait Sink: Send + Sync {
    /// Drain target, used for duplicate detection.
    fn identifier(&self) -> &str;
    /// Application the sink delivers for.
    fn stream_id(&self) -> &str;
    /// Whether the sink also wants error-stream envelopes.
    fn should_receive_errors(&self) -> bool;
    /// Request shutdown. Idempotent.
    fn disconnect(&self);
    /// Lost-message metric, or `None` while nothing has been lost.
    fn instrumentation_metric(&self) -> Option<Metric>;
    /// Count messages dropped upstream of this sink.
    fn add_dropped_messages(&self, count: u64);
}

/// Cloneable handle to a sink, valid before, during and after `run`.
#[derive(Debug, Clone)]
pub struct SinkHandle {
    pub(crate) shared: Arc<Shared>,
}

impl SinkHandle {
    pub fn identity(&self) -> &SinkIdentity {
        &self.shared.identity
    }

    pub fn identifier(&self) -> &str {
        self.shared.identity.drain_url()
    }

    pub fn stream_id(&self) -> &str {
        self.shared.identity.app_id()
    }

    /// Syslog sinks never take error-stream envelopes.
    pub fn should_receive_errors(&self) -> bool {
        false
    }

    /// Stop the sink. Calling it again, from any thread, has no further effect.
    pub fn disconnect(&self) {
        self.shared.disconnect.cancel();
    }

    pub fn is_disconnected(&self) -> bool {
        self.shared.disconnect.is_cancelled()
    }

    /// Cumulative lost messages: buffer evictions plus upstream contributions.
    pub fn dropped_messages(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn add_dropped_messages(&self, count: u64) {
        self.shared.add_dropped(count);
    }

    /// Envelopes the drain accepted.
    pub fn sent_messages(&self) -> u64 {
        self.shared.sent.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> SinkState {
        SinkState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn instrumentation_metric(&self) -> Option<Metric> {
        match self.dropped_messages() {
            0 => None,
            count => Some(Metric::messages_lost(self.stream_id(), self.identifier(), count)),
        }
    }
}

impl Sink for SinkHandle {
    fn identifier(&self) -> &str {
        SinkHandle::identifier(self)
    }

    fn stream_id(&self) -> &str {
        SinkHandle::stream_id(self)
    }

    fn should_receive_errors(&self) -> bool {
        SinkHandle::should_receive_errors(self)
    }

    fn disconnect(&self) {
        SinkHandle::disconnect(self)
    }

    fn instrumentation_metric(&self) -> Option<Metric> {
        SinkHandle::instrumentation_metric(self)
    }

    fn add_dropped_messages(&self, count: u64) {
        SinkHandle::add_dropped_messages(self, count)
    }
}
