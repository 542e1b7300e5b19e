//! Bounded FIFO buffer for finished spans.
//!
//! The buffer is the single shared-mutation point between application
//! producers and the export worker. Global FIFO order must survive across
//! producers, so the queue lives behind one mutex with a short critical
//! section per operation; everything else (drop counting, the closed flag)
//! is atomic and taken outside the lock.

use crate::span::Span;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Fixed-capacity queue holding finished spans awaiting export.
///
/// `enqueue` never blocks the caller: at capacity it drops the span and
/// increments a counter instead. `drain_batch` removes spans oldest-first.
#[derive(Debug)]
pub struct SpanBuffer {
    queue: Mutex<VecDeque<Span>>,
    capacity: usize,
    /// Spans rejected because the buffer was full.
    dropped_overflow: AtomicU64,
    /// Total accepted spans.
    enqueued: AtomicU64,
    /// Set during shutdown; enqueue refuses new spans afterwards.
    closed: AtomicBool,
}

impl SpanBuffer {
    /// Creates a buffer holding at most `capacity` spans.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            dropped_overflow: AtomicU64::new(0),
            enqueued: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Appends a span, returning `false` (and counting the drop) if the
    /// buffer is at capacity or closed. Never blocks beyond the queue lock.
    pub fn enqueue(&self, span: Span) -> bool {
        if self.closed.load(Ordering::Acquire) {
            self.dropped_overflow.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        {
            let mut queue = self.queue.lock().unwrap();
            if queue.len() >= self.capacity {
                drop(queue);
                self.dropped_overflow.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            queue.push_back(span);
        }
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Removes and returns up to `max_count` spans in FIFO order.
    pub fn drain_batch(&self, max_count: usize) -> Vec<Span> {
        let mut queue = self.queue.lock().unwrap();
        let take = max_count.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Number of buffered spans.
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Returns true when no spans are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks the buffer closed; subsequent `enqueue` calls are rejected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Returns `true` once the buffer is closed to new spans.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Spans rejected at capacity (or after close) so far.
    pub fn dropped_overflow(&self) -> u64 {
        self.dropped_overflow.load(Ordering::Relaxed)
    }

    /// Spans accepted so far.
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }
}
