mod common;

use drainpipe::envelope::{Envelope, MessageType};
use drainpipe::writer::TcpSyslogWriter;
use drainpipe::{InstantSleeper, MemoryReporter, SinkConfig, StopReason, SyslogSink};
use std::sync::Arc;
use std::time::Duration;
use common::{init_tracing, typed_log_envelope, APP_ID};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

fn config() -> SinkConfig {
    SinkConfig {
        hostname: "doppler-z1".to_string(),
        connect_timeout_ms: 1_000,
        write_timeout_ms: 1_000,
        ..SinkConfig::default()
    }
}

/// Split an octet-counted stream into its frames.
fn frames(mut raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    while let Some((len, rest)) = raw.split_once(' ') {
        let len: usize = len.parse().unwrap();
        out.push(rest[..len].to_string());
        raw = &rest[len..];
    }
    out
}

#[tokio::test]
async fn delivers_framed_syslog_over_tcp() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let drain_url = format!("syslog://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = String::new();
        socket.read_to_string(&mut received).await.unwrap();
        received
    });

    let reporter = MemoryReporter::new();
    let sink = SyslogSink::tcp(APP_ID, &drain_url, reporter.clone(), &config()).unwrap();
    let handle = sink.handle();
    let feed = futures::stream::iter(vec![
        typed_log_envelope(1, MessageType::Out),
        typed_log_envelope(2, MessageType::Err),
    ]);
    assert_eq!(sink.run(feed).await, StopReason::UpstreamClosed);

    let frames = frames(&server.await.unwrap());
    assert_eq!(frames.len(), 2);
    let expected = "<14>1 1970-01-01T00:00:00.000000Z doppler-z1 app-1 [APP/0] - - #1\n";
    assert_eq!(frames[0], expected);
    assert!(frames[1].starts_with("<11>1 "));
    assert!(frames[1].ends_with("#2\n"));
    assert!(reporter.is_empty());
    assert_eq!(handle.sent_messages(), 2);
}

#[tokio::test]
async fn unreachable_drain_is_reported_until_disconnect() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let drain_url = format!("syslog://{}", listener.local_addr().unwrap());
    drop(listener);

    let reporter = MemoryReporter::new();
    let writer = TcpSyslogWriter::new(&drain_url, APP_ID, &config()).unwrap();
    let sink = SyslogSink::builder(APP_ID, drain_url.clone())
        .writer(writer)
        .reporter(reporter.clone())
        .sleeper(InstantSleeper)
        .build()
        .unwrap();
    let handle = sink.handle();
    let feed = futures::stream::pending::<Arc<Envelope>>();
    let worker = tokio::spawn(sink.run(feed));

    tokio::time::timeout(Duration::from_secs(5), async {
        while reporter.len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connect failures should be reported");
    handle.disconnect();

    assert_eq!(worker.await.unwrap(), StopReason::Disconnected);
    let reports = reporter.reports();
    assert!(reports.iter().all(|r| r.drain_target == drain_url && r.source_id == APP_ID));
    assert!(reports[0].message.contains("Error when dialing out"));
}
