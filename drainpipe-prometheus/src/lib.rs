//! Prometheus metrics for `drainpipe`.
//! Bring your own `prometheus::Registry`; gauges and counters are registered into it.
//!
//! - [`PrometheusExporter`] mirrors each sink's lost-message count into the
//!   `drainpipe_messages_lost` gauge, labelled by `app_id` and `drain_url`.
//! - [`PrometheusSink`] is a telemetry sink counting sink events in
//!   `drainpipe_sink_events_total`, labelled by `event`.

use drainpipe::telemetry::{SinkEvent, TelemetrySink};
use drainpipe::Sink;
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};
use std::convert::Infallible;
use std::future::{ready, Ready};
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::debug;

/// Copies sink instrumentation into a labelled gauge on demand.
#[derive(Clone, Debug)]
pub struct PrometheusExporter {
    registry: Arc<Registry>,
    lost: IntGaugeVec,
}

impl PrometheusExporter {
    /// Register the lost-message gauge into `registry`.
    ///
    /// # Errors
    /// Returns an error if the metric cannot be registered (e.g. name conflict).
    pub fn new<R: Into<Arc<Registry>>>(registry: R) -> Result<Self, prometheus::Error> {
        let registry = registry.into();
        let lost = IntGaugeVec::new(
            Opts::new("drainpipe_messages_lost", "Messages a sink could not deliver"),
            &["app_id", "drain_url"],
        )?;
        registry.register(Box::new(lost.clone()))?;
        Ok(Self { registry, lost })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Publish the sink's current count. A sink with no losses reads as zero.
    pub fn observe(&self, sink: &dyn Sink) {
        let value = sink.instrumentation_metric().map_or(0, |metric| metric.value);
        let value = i64::try_from(value).unwrap_or(i64::MAX);
        self.lost.with_label_values(&[sink.stream_id(), sink.identifier()]).set(value);
    }

    /// Drop the sink's series, e.g. after it has been unregistered.
    pub fn forget(&self, sink: &dyn Sink) {
        if let Err(e) = self.lost.remove_label_values(&[sink.stream_id(), sink.identifier()]) {
            debug!(
                app_id = sink.stream_id(),
                drain_url = sink.identifier(),
                error = %e,
                "no series to forget"
            );
        }
    }

    /// Current gauge value for one sink.
    pub fn messages_lost(&self, app_id: &str, drain_url: &str) -> i64 {
        self.lost.with_label_values(&[app_id, drain_url]).get()
    }
}

/// Telemetry sink counting sink events by kind.
#[derive(Clone, Debug)]
pub struct PrometheusSink {
    registry: Arc<Registry>,
    counter: IntCounterVec,
}

impl PrometheusSink {
    /// Create a sink and register its counter into the provided registry.
    ///
    /// # Errors
    /// Returns an error if the metric cannot be registered (e.g. name conflict).
    pub fn new<R: Into<Arc<Registry>>>(registry: R) -> Result<Self, prometheus::Error> {
        let registry = registry.into();
        let counter = IntCounterVec::new(
            Opts::new("drainpipe_sink_events_total", "Sink state transitions"),
            &["event"],
        )?;
        registry.register(Box::new(counter.clone()))?;
        Ok(Self { registry, counter })
    }

    /// Expose the registry for HTTP scraping.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn count(&self, kind: &str) -> u64 {
        self.counter.with_label_values(&[kind]).get()
    }
}

impl tower::Service<SinkEvent> for PrometheusSink {
    type Response = ();
    type Error = Infallible;
    type Future = Ready<Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: SinkEvent) -> Self::Future {
        self.counter.with_label_values(&[event.kind()]).inc();
        ready(Ok(()))
    }
}

impl TelemetrySink for PrometheusSink {
    type SinkError = Infallible;
}
