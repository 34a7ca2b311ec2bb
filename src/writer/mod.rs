//! Drain writer capability.
//!
//! The sink only ever talks to a drain through [`DrainWriter`]: dial, write one formatted
//! message, close. Protocol and transport live behind the trait. [`tcp::TcpSyslogWriter`]
//! speaks RFC 5424 over TCP; [`memory::MemoryWriter`] is a scriptable in-memory double.
//!
//! Contract the sink relies on:
//! - `write` is never retried by the writer itself; one failure means the session is dead.
//! - `close` is safe to call without a prior successful `connect`.

use crate::error::DrainError;
use async_trait::async_trait;

pub mod format;
pub mod memory;
pub mod tcp;

pub use memory::{MemoryWriter, MemoryWriterHandle, RecordedWrite};
pub use tcp::TcpSyslogWriter;

/// Connect / write / close against one remote drain.
#[async_trait]
pub trait DrainWriter: Send {
    /// Establish a session. Called again after any failed write.
    async fn connect(&mut self) -> Result<(), DrainError>;

    /// Write one log line; returns the number of bytes put on the wire.
    async fn write(
        &mut self,
        priority: i32,
        message: &[u8],
        source_type: &str,
        source_instance: &str,
        timestamp: i64,
    ) -> Result<usize, DrainError>;

    /// Release the session, if any.
    async fn close(&mut self);
}

#[async_trait]
impl<W: DrainWriter + ?Sized> DrainWriter for Box<W> {
    async fn connect(&mut self) -> Result<(), DrainError> {
        (**self).connect().await
    }

    async fn write(
        &mut self,
        priority: i32,
        message: &[u8],
        source_type: &str,
        source_instance: &str,
        timestamp: i64,
    ) -> Result<usize, DrainError> {
        (**self).write(priority, message, source_type, source_instance, timestamp).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }
}
