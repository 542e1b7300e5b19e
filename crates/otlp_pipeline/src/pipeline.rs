//! Pipeline supervisor: lifecycle and wiring.
//!
//! [`TracePipeline::start`] validates the configuration, builds the
//! configured transport and spawns the export worker. Application code
//! calls [`TracePipeline::enqueue`] from any thread or task; the worker
//! drains batches on its own schedule, and [`TracePipeline::shutdown`]
//! forces a final flush bounded by a deadline.
//!
//! Telemetry failures never propagate to instrumentation call sites:
//! `enqueue` returns a bool, everything else is counted in
//! [`PipelineMetrics`].

use crate::buffer::SpanBuffer;
use crate::config::{ConfigError, PipelineConfig};
use crate::exporter::SpanExporterBoxed;
use crate::metrics::PipelineMetrics;
use crate::retry::{self, RetryPolicy};
use crate::scheduler::BatchScheduler;
use crate::span::{Span, SpanBatch};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What the pipeline confirmed by the end of shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Spans confirmed received by the collector.
    pub sent: u64,
    /// Spans dropped on any counted path (overflow, retry exhaustion,
    /// fatal failure, forced termination).
    pub dropped: u64,
}

struct Worker {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the span buffer, the export worker and all accounting.
///
/// Explicitly constructed and explicitly owned; pass it by reference (or
/// `Arc`) to whichever code finishes spans. There is no process-global
/// instance.
pub struct TracePipeline {
    buffer: Arc<SpanBuffer>,
    metrics: Arc<PipelineMetrics>,
    worker: Mutex<Option<Worker>>,
}

impl TracePipeline {
    /// Validates `config`, builds the transport and starts the worker.
    ///
    /// Fails with [`ConfigError`] rather than starting a silently disabled
    /// pipeline.
    pub async fn start(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let exporter = crate::transport::build_exporter(&config)?;
        Self::start_with_exporter(config, exporter).await
    }

    /// Like [`TracePipeline::start`] but with a caller-supplied exporter,
    /// ignoring the configured transport variant. Useful for custom
    /// backends and for tests with stub transports.
    pub async fn start_with_exporter(
        config: PipelineConfig,
        exporter: Box<dyn SpanExporterBoxed>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let buffer = Arc::new(SpanBuffer::new(config.max_queue_size));
        let metrics = Arc::new(PipelineMetrics::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        info!(
            endpoint = %config.endpoint,
            transport = ?config.transport,
            batch_size = config.batch_size,
            max_queue_size = config.max_queue_size,
            "starting trace export pipeline"
        );

        let handle = tokio::spawn(worker_loop(
            Arc::clone(&buffer),
            exporter,
            config,
            Arc::clone(&metrics),
            shutdown_rx,
        ));

        Ok(Self {
            buffer,
            metrics,
            worker: Mutex::new(Some(Worker {
                shutdown_tx,
                handle,
            })),
        })
    }

    /// Hands a finished span to the pipeline.
    ///
    /// O(1), never blocks beyond the buffer's short critical section, and
    /// never fails the caller: at capacity (or after shutdown began) the
    /// span is dropped, counted, and `false` returned. Callers must not
    /// depend on the return value for correctness.
    pub fn enqueue(&self, span: Span) -> bool {
        if self.buffer.enqueue(span) {
            self.metrics.record_enqueued();
            true
        } else {
            self.metrics.record_overflow(1);
            false
        }
    }

    /// Pipeline counters (sent, dropped per path, retries).
    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Spans currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Stops accepting spans, forces a final flush and awaits in-flight
    /// work up to `timeout`. Past the deadline the worker is cancelled and
    /// unexported spans are counted as dropped.
    ///
    /// Idempotent: a second call reports the same totals without touching
    /// the already stopped worker.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownSummary {
        let worker = self.worker.lock().await.take();

        if let Some(worker) = worker {
            self.buffer.close();
            let _ = worker.shutdown_tx.send(());

            let mut handle = worker.handle;
            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(())) => debug!("export worker drained and exited"),
                Ok(Err(e)) => warn!(error = %e, "export worker task failed"),
                Err(_) => {
                    warn!(timeout = ?timeout, "shutdown deadline reached, cancelling export worker");
                    handle.abort();
                }
            }

            // Spans that were accepted but neither sent nor counted on a
            // drop path were lost to the forced termination.
            let accounted = self.metrics.spans_sent()
                + self.metrics.dropped_retry_exhausted()
                + self.metrics.dropped_fatal()
                + self.metrics.dropped_shutdown();
            let unaccounted = self.metrics.spans_enqueued().saturating_sub(accounted);
            if unaccounted > 0 {
                self.metrics.record_dropped_shutdown(unaccounted);
            }

            info!(
                sent = self.metrics.spans_sent(),
                dropped = self.metrics.spans_dropped(),
                "pipeline shut down"
            );
        }

        ShutdownSummary {
            sent: self.metrics.spans_sent(),
            dropped: self.metrics.spans_dropped(),
        }
    }
}

/// Export worker: accumulate, flush, deliver; one in-flight batch at a time.
///
/// A later batch never starts transmission before the earlier batch's
/// retry-or-drop outcome is final, so batches arrive at the collector in
/// flush order and in-flight memory stays bounded by one batch.
async fn worker_loop(
    buffer: Arc<SpanBuffer>,
    exporter: Box<dyn SpanExporterBoxed>,
    config: PipelineConfig,
    metrics: Arc<PipelineMetrics>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut scheduler = BatchScheduler::new(config.batch_size, config.flush_interval);
    let policy = RetryPolicy::from_config(&config);

    // Poll well inside the flush interval so both triggers fire promptly.
    let poll = (config.flush_interval / 4)
        .min(Duration::from_millis(20))
        .max(Duration::from_millis(1));
    let mut interval = tokio::time::interval(poll);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut last_observation = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if last_observation.elapsed() >= config.flush_interval {
                    scheduler.observe_drops(buffer.dropped_overflow());
                    last_observation = tokio::time::Instant::now();
                }

                if scheduler.should_flush(buffer.len()) {
                    let spans = buffer.drain_batch(scheduler.batch_size());
                    scheduler.note_flush();
                    if !spans.is_empty() {
                        let batch = SpanBatch::with_spans(spans);
                        retry::deliver(
                            exporter.as_ref(),
                            batch,
                            &policy,
                            config.export_timeout,
                            &metrics,
                        )
                        .await;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                buffer.close();
                debug!(buffered = buffer.len(), "final flush on shutdown");

                loop {
                    let spans = buffer.drain_batch(config.batch_size);
                    if spans.is_empty() {
                        break;
                    }
                    let batch = SpanBatch::with_spans(spans);
                    retry::deliver(
                        exporter.as_ref(),
                        batch,
                        &policy,
                        config.export_timeout,
                        &metrics,
                    )
                    .await;
                }
                break;
            }
        }
    }
}
