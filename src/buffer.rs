//! Bounded, drop-oldest buffer between a sink's feed and its network loop.
//!
//! The input side never blocks: when the buffer is full the oldest envelope is evicted and the
//! dropped counter goes up by one. The output side hands envelopes out in arrival order and
//! reports `None` once the input side is closed and everything buffered has been read.
//!
//! ```rust
//! use std::sync::Arc;
//! use drainpipe::buffer::truncating_buffer;
//! use drainpipe::envelope::{Envelope, LogMessage, MessageType};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let (input, mut output) = truncating_buffer(2);
//! for i in 0..3 {
//!     let message = LogMessage::new(format!("{i}"), MessageType::Out, i);
//!     input.push(Arc::new(Envelope::log("o", message)));
//! }
//! drop(input);
//! assert_eq!(output.take_dropped(), 1);
//! assert_eq!(output.recv().await.unwrap().timestamp, 1);
//! assert_eq!(output.recv().await.unwrap().timestamp, 2);
//! assert!(output.recv().await.is_none());
//! # });
//! ```

use crate::envelope::Envelope;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{trace, warn};

/// Capacity used by sinks unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<Arc<Envelope>>,
    /// Drops since the consumer last called `take_dropped`.
    dropped: u64,
    /// Drops over the buffer's lifetime; only drives log rate limiting.
    lifetime_dropped: u64,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    capacity: usize,
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        let newly_closed = {
            let mut state = self.lock();
            !std::mem::replace(&mut state.closed, true)
        };
        if newly_closed {
            self.notify.notify_one();
        }
    }
}

/// Create a buffer holding at most `capacity` envelopes. A capacity of 0 is raised to 1.
pub fn truncating_buffer(capacity: usize) -> (BufferInput, BufferOutput) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::default()),
        capacity: capacity.max(1),
        notify: Notify::new(),
    });
    (BufferInput { shared: shared.clone() }, BufferOutput { shared })
}

/// Producer side of a truncating buffer. Dropping it closes the buffer.
#[derive(Debug)]
pub struct BufferInput {
    shared: Arc<Shared>,
}

impl BufferInput {
    /// Enqueue without blocking. Returns `true` when the oldest envelope had to be evicted.
    pub fn push(&self, envelope: Arc<Envelope>) -> bool {
        let capacity = self.shared.capacity;
        let evicted = {
            let mut state = self.shared.lock();
            if state.closed {
                trace!("buffer closed; ignoring envelope");
                return false;
            }
            let evicted = if state.queue.len() >= capacity {
                state.queue.pop_front();
                state.dropped = state.dropped.wrapping_add(1);
                state.lifetime_dropped = state.lifetime_dropped.wrapping_add(1);
                let lifetime = state.lifetime_dropped;
                if lifetime == 1 || lifetime % capacity as u64 == 0 {
                    warn!(
                        capacity,
                        dropped_total = lifetime,
                        "buffer full; dropping oldest envelope"
                    );
                }
                true
            } else {
                false
            };
            state.queue.push_back(envelope);
            evicted
        };
        self.shared.notify.notify_one();
        evicted
    }

    /// Mark the input exhausted. Buffered envelopes stay readable.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl Drop for BufferInput {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Consumer side of a truncating buffer.
#[derive(Debug)]
pub struct BufferOutput {
    shared: Arc<Shared>,
}

impl BufferOutput {
    /// Next envelope in arrival order, or `None` once closed and drained.
    ///
    /// Cancel safe: dropping the future never loses a buffered envelope.
    pub async fn recv(&mut self) -> Option<Arc<Envelope>> {
        loop {
            {
                let mut state = self.shared.lock();
                if let Some(envelope) = state.queue.pop_front() {
                    return Some(envelope);
                }
                if state.closed {
                    return None;
                }
            }
            self.shared.notify.notified().await;
        }
    }

    /// Drops since the previous call; resets the count to zero.
    pub fn take_dropped(&self) -> u64 {
        std::mem::take(&mut self.shared.lock().dropped)
    }

    pub fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}
