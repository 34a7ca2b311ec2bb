use drainpipe::telemetry::SinkEvent;
use drainpipe::writer::MemoryWriter;
use drainpipe::{InstantSleeper, LogMessage, MessageType, Sink, StopReason, SyslogSink};
use drainpipe_prometheus::{PrometheusExporter, PrometheusSink};
use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;
use tower::Service;

const APP_ID: &str = "app-1";
const DRAIN_URL: &str = "syslog://drain:514";

fn idle_sink() -> SyslogSink {
    SyslogSink::builder(APP_ID, DRAIN_URL).writer(MemoryWriter::new()).build().unwrap()
}

#[test]
fn observe_mirrors_the_lost_message_count() {
    let exporter = PrometheusExporter::new(Registry::new()).expect("register gauge");
    let handle = idle_sink().handle();

    exporter.observe(&handle);
    assert_eq!(exporter.messages_lost(APP_ID, DRAIN_URL), 0);

    handle.add_dropped_messages(7);
    exporter.observe(&handle);
    assert_eq!(exporter.messages_lost(APP_ID, DRAIN_URL), 7);

    let sink: &dyn Sink = &handle;
    sink.add_dropped_messages(1);
    exporter.observe(sink);
    assert_eq!(exporter.messages_lost(APP_ID, DRAIN_URL), 8);
}

#[test]
fn forget_removes_the_series() {
    let registry = Registry::new();
    let exporter = PrometheusExporter::new(registry.clone()).expect("register gauge");
    let handle = idle_sink().handle();
    handle.add_dropped_messages(2);

    exporter.observe(&handle);
    assert_eq!(registry.gather().len(), 1);

    exporter.forget(&handle);
    assert!(registry.gather().is_empty());
    // Forgetting twice is tolerated.
    exporter.forget(&handle);
}

#[test]
fn duplicate_registration_fails() {
    let registry = Registry::new();
    PrometheusExporter::new(registry.clone()).expect("first registration");
    assert!(PrometheusExporter::new(registry).is_err());
}

#[tokio::test]
async fn counts_events_by_kind() {
    let mut sink = PrometheusSink::new(Registry::new()).expect("register counter");
    let events = [
        SinkEvent::BackingOff { delay: Duration::from_millis(1) },
        SinkEvent::Connecting { attempt: 0 },
        SinkEvent::Connected,
        SinkEvent::Sent { bytes: 10 },
        SinkEvent::Sent { bytes: 12 },
        SinkEvent::Stopped { reason: StopReason::Disconnected },
    ];
    for event in events {
        sink.call(event).await.expect("infallible");
    }
    assert_eq!(sink.count("sent"), 2);
    assert_eq!(sink.count("connected"), 1);
    assert_eq!(sink.count("connect_failed"), 0);
}

#[tokio::test]
async fn wires_into_a_running_sink() {
    let events = PrometheusSink::new(Registry::new()).expect("register counter");
    let sink = SyslogSink::builder(APP_ID, DRAIN_URL)
        .writer(MemoryWriter::new().fail_connects(1))
        .sleeper(InstantSleeper)
        .telemetry(events.clone())
        .build()
        .unwrap();

    let envelope = drainpipe::Envelope::log("router", LogMessage::new("hi", MessageType::Out, 0));
    let reason = sink.run(futures::stream::iter(vec![Arc::new(envelope)])).await;

    assert_eq!(reason, StopReason::UpstreamClosed);
    assert_eq!(events.count("connect_failed"), 1);
    assert_eq!(events.count("sent"), 1);
    assert_eq!(events.count("stopped"), 1);
}
