//! Micro-batch accumulator for queue messages.
//!
//! Collects [`QueueMessage`]s and flushes when either the size threshold
//! or time window is reached, whichever comes first. This balances
//! throughput (larger batches) with latency (time-bounded delivery).

use std::time::{Duration, Instant};

use crate::consumer::QueueMessage;

/// Accumulates queue messages into micro-batches.
///
/// Flushes when either the size threshold OR time window is reached,
/// whichever comes first.
pub struct MicroBatcher {
    buffer: Vec<QueueMessage>,
    max_size: usize,
    max_wait: Duration,
    batch_started: Option<Instant>,
}

impl MicroBatcher {
    /// Create a new batcher with the given size and time thresholds.
    ///
    /// - `max_size`: flush when this many messages are buffered.
    /// - `max_wait`: flush when this duration has elapsed since the first
    ///   message in the current batch was pushed.
    pub fn new(max_size: usize, max_wait: Duration) -> Self {
        Self {
            buffer: Vec::with_capacity(max_size),
            max_size,
            max_wait,
            batch_started: None,
        }
    }

    /// Add messages to the current batch.
    ///
    /// Starts the batch timer on the first non-empty push.
    pub fn push(&mut self, messages: Vec<QueueMessage>) {
        if self.batch_started.is_none() && !messages.is_empty() {
            self.batch_started = Some(Instant::now());
        }
        self.buffer.extend(messages);
    }

    /// Check if the batch should be flushed.
    ///
    /// Returns `true` when the buffer has reached `max_size` or
    /// `max_wait` has elapsed since the batch started.
    pub fn should_flush(&self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        if self.buffer.len() >= self.max_size {
            return true;
        }
        if let Some(started) = self.batch_started {
            if started.elapsed() >= self.max_wait {
                return true;
            }
        }
        false
    }

    /// Flush the current batch, returning all accumulated messages.
    ///
    /// Resets the batcher for the next batch.
    pub fn flush(&mut self) -> Vec<QueueMessage> {
        self.batch_started = None;
        std::mem::take(&mut self.buffer)
    }

    /// Flush only if thresholds are met, otherwise return `None`.
    pub fn try_flush(&mut self) -> Option<Vec<QueueMessage>> {
        if self.should_flush() {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Number of messages currently buffered.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
