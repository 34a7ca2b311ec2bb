#![allow(dead_code)]

use drainpipe::envelope::{Envelope, EventType, LogMessage, MessageType};
use drainpipe::SinkHandle;
use drainpipe::SinkState;
use std::sync::Arc;
use std::time::Duration;

pub const APP_ID: &str = "app-1";
pub const DRAIN_URL: &str = "syslog://drain.example.com:514";

/// Stdout log envelope whose message is `#<n>`.
pub fn log_envelope(n: i64) -> Arc<Envelope> {
    typed_log_envelope(n, MessageType::Out)
}

pub fn typed_log_envelope(n: i64, message_type: MessageType) -> Arc<Envelope> {
    let message = LogMessage::new(format!("#{n}"), message_type, n)
        .with_app_id(APP_ID)
        .with_source("App", "0");
    Arc::new(Envelope::log("router", message))
}

pub fn metric_envelope(n: i64) -> Arc<Envelope> {
    Arc::new(Envelope::event("router", EventType::ValueMetric, n))
}

/// Poll until the sink publishes `state`, failing after one second.
pub async fn wait_for_state(handle: &SinkHandle, state: SinkState) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while handle.state() != state {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("sink never reached {state}; stuck in {}", handle.state()));
}

/// Route `tracing` output through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
