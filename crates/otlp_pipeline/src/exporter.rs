use crate::span::SpanBatch;
use std::future::Future;
use thiserror::Error;

/// Error types for span export operations.
///
/// The retry controller only needs one bit of classification, exposed via
/// [`ExportError::is_retryable`]: transient failures are retried with
/// backoff, everything else drops the batch immediately.
#[derive(Debug, Error, Clone)]
pub enum ExportError {
    /// Network-level error (connect, read, write)
    #[error("transport error: {0}")]
    Transport(String),
    /// Send attempt exceeded the configured timeout
    #[error("export operation timed out")]
    Timeout,
    /// Server responded with an HTTP-equivalent status code
    #[error("server returned status {code}: {message}")]
    Status { code: u16, message: String },
    /// Payload could not be serialized
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Server rejected the request as malformed or unauthorized
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ExportError {
    /// Returns `true` when a retry can plausibly succeed.
    ///
    /// Network errors, timeouts, 5xx responses and 429 pushback are
    /// retryable. Malformed-request and authentication failures are not;
    /// resending the same bytes cannot change the outcome.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { code, .. } => *code >= 500 || *code == 429,
            Self::Serialization(_) | Self::Rejected(_) => false,
        }
    }
}

/// Trait for exporting span batches to a backend.
///
/// Uses native async fn in traits. The returned future may block on network
/// I/O up to the transport's configured timeout; it runs only on the export
/// worker, never on application threads.
///
/// # Note on Object Safety
///
/// `impl Future` return types are not object-safe. For dynamic dispatch,
/// use `Box<dyn SpanExporterBoxed>` via the blanket impl below.
pub trait SpanExporter: Send + Sync {
    /// Exports a batch of spans.
    fn export(&self, batch: SpanBatch) -> impl Future<Output = Result<(), ExportError>> + Send;

    /// Returns the exporter name for debugging.
    fn name(&self) -> &str;
}

/// Object-safe version of [`SpanExporter`] for dynamic dispatch.
pub trait SpanExporterBoxed: Send + Sync {
    /// Exports a batch of spans (boxed future for object safety).
    fn export_boxed(
        &self,
        batch: SpanBatch,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>>;

    /// Returns the exporter name for debugging.
    fn name(&self) -> &str;
}

/// Blanket implementation: any `SpanExporter` can be used as `SpanExporterBoxed`.
impl<T: SpanExporter> SpanExporterBoxed for T {
    fn export_boxed(
        &self,
        batch: SpanBatch,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>> {
        Box::pin(self.export(batch))
    }

    fn name(&self) -> &str {
        SpanExporter::name(self)
    }
}

/// Console exporter for debugging; the `console` transport variant.
pub struct ConsoleExporter {
    verbose: bool,
}

impl ConsoleExporter {
    /// Creates a new console exporter. With `verbose` every span is printed;
    /// otherwise only a per-batch summary line.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl SpanExporter for ConsoleExporter {
    async fn export(&self, batch: SpanBatch) -> Result<(), ExportError> {
        if self.verbose {
            for span in &batch.spans {
                println!(
                    "span trace_id={:032x} span_id={:016x} name={} duration={}ns status={:?}",
                    span.trace_id,
                    span.span_id,
                    span.name,
                    span.duration_nanos(),
                    span.status
                );
            }
        } else {
            println!("exported batch of {} spans", batch.spans.len());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
