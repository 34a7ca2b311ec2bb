#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # drainpipe
//!
//! Per-application delivery of log envelopes to remote syslog drains.
//!
//! Each [`SyslogSink`] owns one connection to one drain on behalf of one application. It buffers
//! envelopes in a bounded, drop-oldest queue so producers never block, reconnects with
//! exponential backoff when the drain goes away, and counts every message it had to give up on.
//!
//! ## Features
//!
//! - **Truncating buffer** that evicts the oldest envelope instead of applying backpressure
//! - **Exponential backoff** with optional jitter, interruptible by `disconnect`
//! - **Pluggable transport** through the [`DrainWriter`] capability (TCP syslog built in)
//! - **Lost-message instrumentation** via [`Metric`]
//! - **Telemetry events** for every state transition, as a `tower::Service`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drainpipe::{Envelope, LogMessage, LogReporter, MessageType, SinkConfig, SyslogSink};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), drainpipe::SinkError> {
//!     let config = SinkConfig::default();
//!     let sink = SyslogSink::tcp("app-1", "syslog://logs.example.com:514", LogReporter, &config)?;
//!     let handle = sink.handle();
//!
//!     let (tx, rx) = futures::channel::mpsc::unbounded::<Arc<Envelope>>();
//!     let worker = tokio::spawn(sink.run(rx));
//!
//!     let message = LogMessage::new("hello", MessageType::Out, 0).with_app_id("app-1");
//!     tx.unbounded_send(Arc::new(Envelope::log("router", message))).ok();
//!
//!     handle.disconnect();
//!     worker.await.ok();
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod buffer;
pub mod config;
pub mod envelope;
pub mod error;
pub mod instrumentation;
pub mod jitter;
pub mod prelude;
pub mod report;
pub mod sink;
pub mod sleeper;
pub mod telemetry;
pub mod writer;

// Re-exports
pub use backoff::{Backoff, BackoffError, BackoffStrategy};
pub use buffer::{truncating_buffer, BufferInput, BufferOutput};
pub use config::{ConfigError, SinkConfig};
pub use envelope::{Envelope, EventType, LogMessage, MessageType};
pub use error::{DrainError, SinkError, StopReason};
pub use instrumentation::Metric;
pub use jitter::Jitter;
pub use report::{ErrorReporter, LogReporter, MemoryReporter};
pub use sink::{Sink, SinkHandle, SinkIdentity, SinkState, SyslogSink, SyslogSinkBuilder};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use telemetry::SinkEvent;
pub use writer::{DrainWriter, MemoryWriter, TcpSyslogWriter};
