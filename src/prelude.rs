//! Convenient re-exports for wiring up sinks.
pub use crate::{
    backoff::{Backoff, BackoffStrategy},
    config::SinkConfig,
    envelope::{Envelope, EventType, LogMessage, MessageType},
    error::{DrainError, SinkError, StopReason},
    jitter::Jitter,
    report::{ErrorReporter, LogReporter},
    sink::{Sink, SinkHandle, SyslogSink},
    telemetry::{LogSink, NullSink, SinkEvent, TelemetrySink},
    writer::{DrainWriter, TcpSyslogWriter},
};
