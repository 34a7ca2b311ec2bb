//! Syslog sink worker.
//!
//! One [`SyslogSink`] delivers one application's log envelopes to one drain. [`SyslogSink::run`]
//! drives two cooperating tasks:
//!
//! - a filter task that reads the feed, keeps only log-message envelopes and pushes them into a
//!   truncating buffer (never blocking the producer);
//! - the main loop, which waits out the backoff, (re)connects when needed, pulls the next
//!   envelope from the buffer and writes it.
//!
//! Loop semantics:
//! - The wait before every iteration is `backoff(attempts)`; `attempts` counts consecutive
//!   failures (connect or send) and resets to zero after a successful send.
//! - Every connect or send failure is reported to the [`ErrorReporter`] with the next backoff.
//! - A failed send discards the envelope and forces a reconnect.
//! - Buffer evictions are folded into the sink's lost-message counter whenever an envelope is
//!   received, and once more on exit.
//! - `disconnect` wins every race: it interrupts the backoff wait and the receive wait.
//!
//! ```rust
//! use std::sync::Arc;
//! use drainpipe::envelope::{Envelope, LogMessage, MessageType};
//! use drainpipe::sleeper::InstantSleeper;
//! use drainpipe::writer::MemoryWriter;
//! use drainpipe::{StopReason, SyslogSink};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let writer = MemoryWriter::new();
//! let written = writer.handle();
//! let sink = SyslogSink::builder("app-1", "syslog://drain.example.com:514")
//!     .writer(writer)
//!     .sleeper(InstantSleeper)
//!     .build()
//!     .unwrap();
//!
//! let feed = futures::stream::iter(vec![Arc::new(Envelope::log(
//!     "router",
//!     LogMessage::new("hello", MessageType::Out, 1),
//! ))]);
//! assert_eq!(sink.run(feed).await, StopReason::UpstreamClosed);
//! assert_eq!(written.messages(), vec!["hello"]);
//! # });
//! ```

mod handle;

pub use handle::{Sink, SinkHandle, SinkIdentity, SinkState};

use crate::backoff::BackoffStrategy;
use crate::buffer::{truncating_buffer, BufferInput, BufferOutput};
use crate::config::{ConfigError, SinkConfig};
use crate::envelope::Envelope;
use crate::error::{SinkError, StopReason};
use crate::jitter::Jitter;
use crate::report::{ErrorReporter, LogReporter};
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::telemetry::{
    boxed, emit_best_effort, BoxTelemetrySink, NullSink, SinkEvent, TelemetrySink,
};
use crate::writer::{DrainWriter, TcpSyslogWriter};
use futures::{Stream, StreamExt};
use handle::Shared;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

/// Delivers one application's logs to one syslog drain.
pub struct SyslogSink {
    shared: Arc<Shared>,
    writer: Box<dyn DrainWriter>,
    reporter: Arc<dyn ErrorReporter>,
    backoff: Arc<dyn BackoffStrategy>,
    jitter: Jitter,
    sleeper: Arc<dyn Sleeper>,
    buffer_capacity: usize,
    telemetry: BoxTelemetrySink,
}

impl fmt::Debug for SyslogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyslogSink")
            .field("identity", &self.shared.identity)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("sleeper", &self.sleeper)
            .field("buffer_capacity", &self.buffer_capacity)
            .field("writer", &"<writer>")
            .field("reporter", &"<reporter>")
            .finish()
    }
}

impl SyslogSink {
    /// Sink with backoff, jitter and buffer size taken from `config`.
    pub fn new<W, R>(
        identity: SinkIdentity,
        writer: W,
        reporter: R,
        config: &SinkConfig,
    ) -> Result<Self, SinkError>
    where
        W: DrainWriter + 'static,
        R: ErrorReporter + 'static,
    {
        SyslogSinkBuilder::from_identity(identity)
            .config(config.clone())
            .writer(writer)
            .reporter(reporter)
            .build()
    }

    /// Sink writing RFC 5424 over TCP to `drain_url`.
    pub fn tcp<R>(
        app_id: &str,
        drain_url: &str,
        reporter: R,
        config: &SinkConfig,
    ) -> Result<Self, SinkError>
    where
        R: ErrorReporter + 'static,
    {
        let writer = TcpSyslogWriter::new(drain_url, app_id, config)?;
        Self::new(SinkIdentity::new(app_id, drain_url), writer, reporter, config)
    }

    pub fn builder(app_id: impl Into<String>, drain_url: impl Into<String>) -> SyslogSinkBuilder {
        SyslogSinkBuilder::from_identity(SinkIdentity::new(app_id, drain_url))
    }

    /// Handle for disconnecting and reading counters; stays valid after `run` returns.
    pub fn handle(&self) -> SinkHandle {
        SinkHandle { shared: self.shared.clone() }
    }

    pub fn identity(&self) -> &SinkIdentity {
        &self.shared.identity
    }

    /// Deliver envelopes from `feed` until it ends or the sink is disconnected.
    ///
    /// Returns after the writer has been closed and the filter task has exited.
    pub async fn run<S>(self, feed: S) -> StopReason
    where
        S: Stream<Item = Arc<Envelope>> + Send + 'static,
    {
        let span = info_span!(
            "syslog_sink",
            app_id = %self.shared.identity.app_id(),
            drain_url = %self.shared.identity.drain_url(),
        );
        self.run_inner(feed).instrument(span).await
    }

    async fn run_inner<S>(mut self, feed: S) -> StopReason
    where
        S: Stream<Item = Arc<Envelope>> + Send + 'static,
    {
        info!(capacity = self.buffer_capacity, "running");
        let (input, mut output) = truncating_buffer(self.buffer_capacity);
        let stop_filter = self.shared.disconnect.child_token();
        let filter = tokio::spawn(
            filter_log_messages(feed, input, stop_filter.clone()).in_current_span(),
        );

        let reason = self.drive(&mut output).await;

        self.writer.close().await;
        stop_filter.cancel();
        if let Err(e) = filter.await {
            debug!(error = %e, "filter task ended abnormally");
        }
        self.shared.add_dropped(output.take_dropped());
        self.shared.set_state(SinkState::Disconnected);
        self.emit(SinkEvent::Stopped { reason }).await;
        info!(%reason, dropped = self.handle().dropped_messages(), "stopped");
        reason
    }

    async fn drive(&mut self, output: &mut BufferOutput) -> StopReason {
        let disconnect = self.shared.disconnect.clone();
        let mut attempts: usize = 0;
        let mut connected = false;

        loop {
            let wait = self.jitter.apply(self.backoff.delay(attempts));
            self.shared.set_state(SinkState::Backoff);
            self.emit(SinkEvent::BackingOff { delay: wait }).await;
            debug!(backoff = ?wait, attempt = attempts, "backing off");
            tokio::select! {
                biased;
                _ = disconnect.cancelled() => return StopReason::Disconnected,
                _ = self.sleeper.sleep(wait) => {}
            }

            if !connected {
                self.shared.set_state(SinkState::Connecting);
                self.emit(SinkEvent::Connecting { attempt: attempts }).await;
                debug!(attempt = attempts, "not connected; connecting");
                // A disconnect during a slow dial is observed at the next wait.
                match self.writer.connect().await {
                    Ok(()) => {
                        info!("successfully connected");
                        connected = true;
                        self.emit(SinkEvent::Connected).await;
                    }
                    Err(err) => {
                        attempts = attempts.saturating_add(1);
                        let next = self.backoff.delay(attempts);
                        debug!(error = %err, attempt = attempts, backoff = ?next, "connect failed");
                        self.report(&format!(
                            "Syslog Sink {}: Error when dialing out. Backing off for {:?}. Err: {}",
                            self.shared.identity.drain_url(),
                            next,
                            err
                        ));
                        self.emit(SinkEvent::ConnectFailed { attempt: attempts, backoff: next })
                            .await;
                        continue;
                    }
                }
            }

            self.shared.set_state(SinkState::WaitingForMessage);
            debug!("waiting for a message");
            let next = tokio::select! {
                biased;
                _ = disconnect.cancelled() => return StopReason::Disconnected,
                next = output.recv() => next,
            };
            self.shared.add_dropped(output.take_dropped());
            let Some(envelope) = next else {
                return StopReason::UpstreamClosed;
            };
            let Some(log) = envelope.as_log_message() else {
                continue;
            };

            self.shared.set_state(SinkState::Sending);
            debug!(bytes = log.message.len(), "sending");
            let result = self
                .writer
                .write(
                    log.message_type.priority(),
                    &log.message,
                    &log.source_type,
                    &log.source_instance,
                    log.timestamp,
                )
                .await;
            match result {
                Ok(bytes) => {
                    debug!(bytes, "sent");
                    attempts = 0;
                    self.shared.record_sent();
                    self.emit(SinkEvent::Sent { bytes }).await;
                }
                Err(err) => {
                    connected = false;
                    attempts = attempts.saturating_add(1);
                    debug!(error = %err, attempt = attempts, "send failed; dropping envelope");
                    self.report(&format!(
                        "Syslog Sink {}: Error when trying to send data to sink. \
                         Backing off for {:?}. Err: {}",
                        self.shared.identity.drain_url(),
                        self.backoff.delay(attempts),
                        err
                    ));
                    self.emit(SinkEvent::SendFailed { attempt: attempts }).await;
                }
            }
        }
    }

    fn report(&self, message: &str) {
        let identity = &self.shared.identity;
        self.reporter.report(message, identity.app_id(), identity.drain_url());
    }

    async fn emit(&mut self, event: SinkEvent) {
        emit_best_effort(&mut self.telemetry, event).await;
    }
}

async fn filter_log_messages<S>(feed: S, input: BufferInput, stop: CancellationToken)
where
    S: Stream<Item = Arc<Envelope>> + Send,
{
    futures::pin_mut!(feed);
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            next = feed.next() => match next {
                Some(envelope) if envelope.is_log_message() => {
                    input.push(envelope);
                }
                Some(_) => {}
                None => break,
            },
        }
    }
    input.close();
}

/// Builder for [`SyslogSink`].
///
/// Explicit `backoff`, `jitter` and `buffer_capacity` settings override the values derived from
/// the [`SinkConfig`].
pub struct SyslogSinkBuilder {
    identity: SinkIdentity,
    config: SinkConfig,
    writer: Option<Box<dyn DrainWriter>>,
    reporter: Arc<dyn ErrorReporter>,
    backoff: Option<Arc<dyn BackoffStrategy>>,
    jitter: Option<Jitter>,
    buffer_capacity: Option<usize>,
    sleeper: Arc<dyn Sleeper>,
    telemetry: BoxTelemetrySink,
}

impl fmt::Debug for SyslogSinkBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyslogSinkBuilder")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .field("has_writer", &self.writer.is_some())
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("buffer_capacity", &self.buffer_capacity)
            .finish()
    }
}

impl SyslogSinkBuilder {
    fn from_identity(identity: SinkIdentity) -> Self {
        Self {
            identity,
            config: SinkConfig::default(),
            writer: None,
            reporter: Arc::new(LogReporter),
            backoff: None,
            jitter: None,
            buffer_capacity: None,
            sleeper: Arc::new(TokioSleeper),
            telemetry: boxed(NullSink),
        }
    }

    pub fn writer<W: DrainWriter + 'static>(mut self, writer: W) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    pub fn reporter<R: ErrorReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn config(mut self, config: SinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the config-derived [`Backoff`](crate::backoff::Backoff) with any strategy.
    pub fn backoff<B: BackoffStrategy + 'static>(mut self, backoff: B) -> Self {
        self.backoff = Some(Arc::new(backoff));
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Envelopes retained while the drain is slow or unreachable.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = Some(capacity);
        self
    }

    pub fn sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn telemetry<T>(mut self, sink: T) -> Self
    where
        T: TelemetrySink,
        T::Future: Send + 'static,
    {
        self.telemetry = boxed(sink);
        self
    }

    pub fn build(mut self) -> Result<SyslogSink, SinkError> {
        let writer = self.writer.take().ok_or(SinkError::MissingWriter)?;
        if let Some(capacity) = self.buffer_capacity {
            self.config.buffer_capacity = capacity;
        }
        self.config.validate()?;
        let backoff: Arc<dyn BackoffStrategy> = match self.backoff {
            Some(backoff) => backoff,
            None => Arc::new(self.config.backoff()?),
        };
        let jitter = match self.jitter {
            Some(jitter) => jitter,
            None => self.config.jitter().map_err(ConfigError::from)?,
        };

        Ok(SyslogSink {
            shared: Arc::new(Shared::new(self.identity)),
            writer,
            reporter: self.reporter,
            backoff,
            jitter,
            sleeper: self.sleeper,
            buffer_capacity: self.config.buffer_capacity,
            telemetry: self.telemetry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::{Backoff, BackoffError};
    use std::time::Duration;
    use crate::writer::MemoryWriter;

    fn delays(strategy: &dyn BackoffStrategy) -> Vec<Duration> {
        (0..6).map(|attempt| strategy.delay(attempt)).collect()
    }

    #[test]
    fn build_requires_a_writer() {
        let err = SyslogSink::builder("app", "syslog://d:514").build().unwrap_err();
        assert!(matches!(err, SinkError::MissingWriter));
    }

    #[test]
    fn build_rejects_zero_capacity() {
        let err = SyslogSink::builder("app", "syslog://d:514")
            .writer(MemoryWriter::new())
            .buffer_capacity(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, SinkError::Config(ConfigError::ZeroBufferCapacity)));
    }

    #[test]
    fn build_validates_config_backoff() {
        let config = SinkConfig { backoff_base_ms: 10, backoff_max_ms: 5, ..SinkConfig::default() };
        let err = SyslogSink::builder("app", "syslog://d:514")
            .writer(MemoryWriter::new())
            .config(config)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            SinkError::Config(ConfigError::Backoff(BackoffError::MaxLessThanBase { .. }))
        ));
    }

    #[test]
    fn explicit_settings_override_config() {
        let backoff = Backoff::exponential(Duration::from_millis(3))
            .with_max(Duration::from_millis(30))
            .unwrap();
        let sink = SyslogSink::builder("app", "syslog://d:514")
            .writer(MemoryWriter::new())
            .backoff(backoff)
            .jitter(Jitter::full())
            .buffer_capacity(7)
            .build()
            .unwrap();
        assert_eq!(delays(sink.backoff.as_ref()), delays(&backoff));
        assert_eq!(sink.jitter, Jitter::full());
        assert_eq!(sink.buffer_capacity, 7);
    }

    #[test]
    fn new_uses_config_defaults() {
        let sink = SyslogSink::new(
            SinkIdentity::new("app", "syslog://d:514"),
            MemoryWriter::new(),
            LogReporter,
            &SinkConfig::default(),
        )
        .unwrap();
        assert_eq!(sink.buffer_capacity, 100);
        assert_eq!(delays(sink.backoff.as_ref()), delays(&Backoff::default()));
        assert!(sink.jitter.is_none());
        assert_eq!(sink.handle().state(), SinkState::Idle);
        assert!(format!("{sink:?}").contains("syslog://d:514"));
    }

    #[test]
    fn build_rejects_zero_backoff_base() {
        let config = SinkConfig { backoff_base_ms: 0, ..SinkConfig::default() };
        let err = SyslogSink::builder("app", "syslog://d:514")
            .writer(MemoryWriter::new())
            .config(config)
            .build()
            .unwrap_err();
        assert!(matches!(err, SinkError::Config(ConfigError::ZeroBackoffBase)));
    }

    #[test]
    fn tcp_rejects_unparseable_urls() {
        let err = SyslogSink::tcp("app", "not a url", LogReporter, &SinkConfig::default())
            .unwrap_err();
        assert!(matches!(err, SinkError::Writer(_)));
    }

    #[tokio::test]
    async fn disconnect_before_run_returns_immediately() {
        let writer = MemoryWriter::new();
        let written = writer.handle();
        let sink = SyslogSink::builder("app", "syslog://d:514").writer(writer).build().unwrap();
        let handle = sink.handle();
        handle.disconnect();

        let reason = sink.run(futures::stream::pending::<Arc<Envelope>>()).await;
        assert_eq!(reason, StopReason::Disconnected);
        assert_eq!(written.connect_calls(), 0);
        assert_eq!(written.close_calls(), 1);
        assert_eq!(handle.state(), SinkState::Disconnected);
    }
}
