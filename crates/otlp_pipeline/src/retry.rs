//! Retry control for failed exports.
//!
//! Drives a batch to a terminal outcome: delivered, dropped after a fatal
//! failure, or dropped once the retry budget is exhausted. Retryable
//! failures back off exponentially with jitter; nothing is retried forever,
//! unbounded retry would unbound memory.

use crate::config::PipelineConfig;
use crate::exporter::{ExportError, SpanExporterBoxed};
use crate::metrics::PipelineMetrics;
use crate::span::SpanBatch;
use rand::Rng;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::warn;

/// Why a batch was dropped instead of delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The failure cannot succeed on retry (malformed request, auth).
    Fatal,
    /// All retry attempts were exhausted.
    RetriesExhausted,
}

/// Terminal outcome of driving one batch through the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The batch reached the collector.
    Delivered { attempts: u32 },
    /// The batch was dropped; its spans are counted, not lost silently.
    Dropped {
        spans: usize,
        attempts: u32,
        reason: DropReason,
    },
}

/// Exponential backoff with jitter, bounded by a retry budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retry attempts after the initial send (0 = no retries).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub base_delay: Duration,
    /// Cap on the exponential growth.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Extracts the retry parameters from a pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.backoff.base,
            max_delay: config.backoff.max,
        }
    }

    /// Delay before retry number `attempt` (1-indexed; attempt 0 is the
    /// initial send and waits nothing).
    ///
    /// `min(max_delay, base_delay * 2^(attempt-1)) * uniform(0.5, 1.0)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = (attempt - 1).min(31);
        let uncapped = self.base_delay.saturating_mul(1u32 << exp);
        let capped = uncapped.min(self.max_delay);
        let jitter: f64 = rand::thread_rng().gen_range(0.5..1.0);
        capped.mul_f64(jitter)
    }
}

/// Drives one batch to a terminal outcome on the export worker.
///
/// Every attempt is bounded by `attempt_timeout`; exceeding it counts as a
/// retryable timeout. All outcome counters are recorded here so callers
/// only act on the returned [`DeliveryOutcome`].
pub(crate) async fn deliver(
    exporter: &dyn SpanExporterBoxed,
    batch: SpanBatch,
    policy: &RetryPolicy,
    attempt_timeout: Duration,
    metrics: &PipelineMetrics,
) -> DeliveryOutcome {
    let span_count = batch.spans.len();
    let max_attempts = policy.max_retries + 1;

    for attempt in 0..max_attempts {
        let delay = policy.delay_for_attempt(attempt);
        if !delay.is_zero() {
            metrics.record_retry();
            sleep(delay).await;
        }

        let result = match timeout(attempt_timeout, exporter.export_boxed(batch.clone())).await {
            Ok(result) => result,
            Err(_) => Err(ExportError::Timeout),
        };

        match result {
            Ok(()) => {
                metrics.record_sent(span_count as u64);
                return DeliveryOutcome::Delivered {
                    attempts: attempt + 1,
                };
            }
            Err(e) if e.is_retryable() => {
                metrics.record_export_failure();
                warn!(
                    exporter = exporter.name(),
                    attempt = attempt + 1,
                    max_attempts,
                    error = %e,
                    "retryable export failure"
                );
            }
            Err(e) => {
                metrics.record_export_failure();
                metrics.record_dropped_fatal(span_count as u64);
                warn!(
                    exporter = exporter.name(),
                    spans = span_count,
                    error = %e,
                    "fatal export failure, dropping batch"
                );
                return DeliveryOutcome::Dropped {
                    spans: span_count,
                    attempts: attempt + 1,
                    reason: DropReason::Fatal,
                };
            }
        }
    }

    metrics.record_dropped_retry_exhausted(span_count as u64);
    warn!(
        exporter = exporter.name(),
        spans = span_count,
        attempts = max_attempts,
        "retry budget exhausted, dropping batch"
    );
    DeliveryOutcome::Dropped {
        spans: span_count,
        attempts: max_attempts,
        reason: DropReason::RetriesExhausted,
    }
}
