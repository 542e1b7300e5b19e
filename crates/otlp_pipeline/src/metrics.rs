//! Pipeline observability counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for everything the pipeline sends or drops.
///
/// The span conservation invariant is checked against these: every span is
/// either still buffered, in flight, confirmed sent, or counted in exactly
/// one drop counter.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Spans accepted into the buffer.
    pub spans_enqueued: AtomicU64,
    /// Spans confirmed received by the collector.
    pub spans_sent: AtomicU64,
    /// Batches confirmed received by the collector.
    pub batches_sent: AtomicU64,
    /// Spans rejected because the buffer was full.
    pub dropped_overflow: AtomicU64,
    /// Spans dropped after the retry budget ran out.
    pub dropped_retry_exhausted: AtomicU64,
    /// Spans dropped on a fatal (non-retryable) failure.
    pub dropped_fatal: AtomicU64,
    /// Spans dropped because shutdown hit its deadline.
    pub dropped_shutdown: AtomicU64,
    /// Failed send attempts (each attempt, not each batch).
    pub export_failures: AtomicU64,
    /// Retry attempts made.
    pub retry_attempts: AtomicU64,
}

// All methods use `Ordering::Relaxed` because these are purely statistical
// counters: no code path depends on them being up to date, they guard no
// other data, and slightly stale reads are fine for observability. Relaxed
// avoids memory barriers on the enqueue hot path.
impl PipelineMetrics {
    pub fn spans_enqueued(&self) -> u64 {
        self.spans_enqueued.load(Ordering::Relaxed)
    }

    pub fn spans_sent(&self) -> u64 {
        self.spans_sent.load(Ordering::Relaxed)
    }

    pub fn batches_sent(&self) -> u64 {
        self.batches_sent.load(Ordering::Relaxed)
    }

    /// Total spans dropped across all drop paths.
    pub fn spans_dropped(&self) -> u64 {
        self.dropped_overflow.load(Ordering::Relaxed)
            + self.dropped_retry_exhausted.load(Ordering::Relaxed)
            + self.dropped_fatal.load(Ordering::Relaxed)
            + self.dropped_shutdown.load(Ordering::Relaxed)
    }

    pub fn dropped_overflow(&self) -> u64 {
        self.dropped_overflow.load(Ordering::Relaxed)
    }

    pub fn dropped_retry_exhausted(&self) -> u64 {
        self.dropped_retry_exhausted.load(Ordering::Relaxed)
    }

    pub fn dropped_fatal(&self) -> u64 {
        self.dropped_fatal.load(Ordering::Relaxed)
    }

    pub fn dropped_shutdown(&self) -> u64 {
        self.dropped_shutdown.load(Ordering::Relaxed)
    }

    pub fn export_failures(&self) -> u64 {
        self.export_failures.load(Ordering::Relaxed)
    }

    pub fn retry_attempts(&self) -> u64 {
        self.retry_attempts.load(Ordering::Relaxed)
    }

    pub(crate) fn record_enqueued(&self) {
        self.spans_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self, span_count: u64) {
        self.spans_sent.fetch_add(span_count, Ordering::Relaxed);
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_overflow(&self, span_count: u64) {
        self.dropped_overflow.fetch_add(span_count, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_retry_exhausted(&self, span_count: u64) {
        self.dropped_retry_exhausted
            .fetch_add(span_count, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_fatal(&self, span_count: u64) {
        self.dropped_fatal.fetch_add(span_count, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_shutdown(&self, span_count: u64) {
        self.dropped_shutdown.fetch_add(span_count, Ordering::Relaxed);
    }

    pub(crate) fn record_export_failure(&self) {
        self.export_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }
}
