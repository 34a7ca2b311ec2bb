//! Telemetry for sink state transitions.
//!
//! The main loop emits a [`SinkEvent`] at each transition (backing off, connecting, connected,
//! sent, send failed, stopped). Events flow through a [`TelemetrySink`], which is a
//! `tower::Service<SinkEvent>` so sinks compose with ordinary tower middleware. Emission is
//! best effort and never influences delivery.

pub mod events;
pub mod sinks;

pub use events::SinkEvent;
pub use sinks::{
    boxed, emit_best_effort, BoxTelemetrySink, LogSink, MemorySink, NullSink, TelemetrySink,
};
