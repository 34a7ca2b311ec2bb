//! In-memory drain writer for tests.
//!
//! Outcomes are scripted up front: each `connect` and `write` pops the next scripted result and
//! succeeds once the script runs out. An optional gate holds every `connect` until released, which
//! lets a test keep the sink's consumer side blocked while it fills the buffer.

use super::DrainWriter;
use crate::error::DrainError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

/// One call to [`DrainWriter::write`] as the writer saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub priority: i32,
    pub message: Vec<u8>,
    pub source_type: String,
    pub source_instance: String,
    pub timestamp: i64,
}

impl RecordedWrite {
    pub fn message_str(&self) -> String {
        String::from_utf8_lossy(&self.message).into_owned()
    }
}

#[derive(Debug, Default)]
struct State {
    connect_script: VecDeque<bool>,
    write_script: VecDeque<bool>,
    connected: bool,
    connect_calls: usize,
    close_calls: usize,
    writes: Vec<RecordedWrite>,
    failed_writes: usize,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    gate: Option<Semaphore>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scriptable in-memory [`DrainWriter`].
#[derive(Debug, Default)]
pub struct MemoryWriter {
    inner: Arc<Inner>,
}

impl MemoryWriter {
    /// Writer that always connects and always writes successfully.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer whose `connect` blocks until [`MemoryWriterHandle::release_connects`] is called.
    pub fn gated() -> Self {
        Self { inner: Arc::new(Inner { state: Mutex::default(), gate: Some(Semaphore::new(0)) }) }
    }

    /// Fail the next `n` connects.
    pub fn fail_connects(self, n: usize) -> Self {
        self.inner.lock().connect_script.extend(std::iter::repeat(false).take(n));
        self
    }

    /// Script write outcomes in order (`true` = success).
    pub fn script_writes(self, outcomes: impl IntoIterator<Item = bool>) -> Self {
        self.inner.lock().write_script.extend(outcomes);
        self
    }

    /// Fail the next `n` writes.
    pub fn fail_writes(self, n: usize) -> Self {
        self.script_writes(std::iter::repeat(false).take(n))
    }

    /// Inspection handle that stays with the test after the writer moves into a sink.
    pub fn handle(&self) -> MemoryWriterHandle {
        MemoryWriterHandle { inner: self.inner.clone() }
    }
}

#[async_trait]
impl DrainWriter for MemoryWriter {
    async fn connect(&mut self) -> Result<(), DrainError> {
        if let Some(gate) = &self.inner.gate {
            // A closed gate lets everyone through.
            let _ = gate.acquire().await;
        }
        let mut state = self.inner.lock();
        state.connect_calls += 1;
        if state.connect_script.pop_front().unwrap_or(true) {
            state.connected = true;
            Ok(())
        } else {
            state.connected = false;
            Err(DrainError::Scripted(format!("scripted connect failure #{}", state.connect_calls)))
        }
    }

    async fn write(
        &mut self,
        priority: i32,
        message: &[u8],
        source_type: &str,
        source_instance: &str,
        timestamp: i64,
    ) -> Result<usize, DrainError> {
        let mut state = self.inner.lock();
        if !state.connected {
            return Err(DrainError::NotConnected);
        }
        if !state.write_script.pop_front().unwrap_or(true) {
            state.connected = false;
            state.failed_writes += 1;
            return Err(DrainError::Scripted(format!(
                "scripted write failure #{}",
                state.failed_writes
            )));
        }
        state.writes.push(RecordedWrite {
            priority,
            message: message.to_vec(),
            source_type: source_type.to_string(),
            source_instance: source_instance.to_string(),
            timestamp,
        });
        Ok(message.len())
    }

    async fn close(&mut self) {
        let mut state = self.inner.lock();
        state.close_calls += 1;
        state.connected = false;
    }
}

/// Read-only view of a [`MemoryWriter`] plus its connect gate.
#[derive(Debug, Clone)]
pub struct MemoryWriterHandle {
    inner: Arc<Inner>,
}

impl MemoryWriterHandle {
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.inner.lock().writes.clone()
    }

    /// Messages of successful writes, lossily decoded.
    pub fn messages(&self) -> Vec<String> {
        self.inner.lock().writes.iter().map(RecordedWrite::message_str).collect()
    }

    pub fn connect_calls(&self) -> usize {
        self.inner.lock().connect_calls
    }

    pub fn close_calls(&self) -> usize {
        self.inner.lock().close_calls
    }

    pub fn failed_writes(&self) -> usize {
        self.inner.lock().failed_writes
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    /// Unblock every pending and future `connect` of a gated writer.
    pub fn release_connects(&self) {
        if let Some(gate) = &self.inner.gate {
            gate.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn scripted_connects_then_success() {
        let mut writer = MemoryWriter::new().fail_connects(2);
        let handle = writer.handle();

        assert!(writer.connect().await.is_err());
        assert!(writer.connect().await.is_err());
        assert!(writer.connect().await.is_ok());
        assert_eq!(handle.connect_calls(), 3);
        assert!(handle.is_connected());
    }

    #[tokio::test]
    async fn failed_write_drops_connection() {
        let mut writer = MemoryWriter::new().script_writes([true, false]);
        let handle = writer.handle();
        writer.connect().await.unwrap();

        assert_eq!(writer.write(14, b"one", "app", "0", 1).await.unwrap(), 3);
        assert!(writer.write(14, b"two", "app", "0", 2).await.is_err());
        assert!(!handle.is_connected());
        assert!(matches!(
            writer.write(14, b"three", "app", "0", 3).await,
            Err(DrainError::NotConnected)
        ));
        assert_eq!(handle.messages(), vec!["one"]);
        assert_eq!(handle.failed_writes(), 1);
    }

    #[tokio::test]
    async fn close_is_counted_even_without_connect() {
        let mut writer = MemoryWriter::new();
        let handle = writer.handle();
        writer.close().await;
        assert_eq!(handle.close_calls(), 1);
    }

    #[tokio::test]
    async fn gate_holds_connect_until_released() {
        let mut writer = MemoryWriter::gated();
        let handle = writer.handle();
        let pending = tokio::spawn(async move { writer.connect().await.is_ok() });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());
        assert_eq!(handle.connect_calls(), 0);

        handle.release_connects();
        assert!(pending.await.unwrap());
        assert_eq!(handle.connect_calls(), 1);
    }
}
