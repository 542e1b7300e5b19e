//! OTLP Trace Export Pipeline
//!
//! A process-wide telemetry exporter pipeline: finished spans go into a
//! bounded FIFO buffer, a background worker batches them by size or time,
//! serializes batches to the OTLP wire shape and transmits them over a
//! configurable transport (gRPC-like framing, HTTP, or console), with
//! bounded retry and explicit drop accounting.
//!
//! # Design
//!
//! - `enqueue` is the only operation on the application's critical path:
//!   O(1), non-blocking, and it never surfaces telemetry failures to the
//!   caller.
//! - One in-flight batch at a time; batches arrive at the collector in
//!   flush order.
//! - Every span ends up in exactly one of buffer, in-flight batch,
//!   confirmed-sent, or a counted drop path. No silent loss.
//!
//! # Example
//!
//! ```ignore
//! use otlp_pipeline::{PipelineConfig, TracePipeline, TransportKind, Span, SpanKind, SpanStatus};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default()
//!         .with_endpoint("http://otel-collector:4318/v1/traces")
//!         .with_transport(TransportKind::Http)
//!         .with_header("authorization", "Bearer <token>");
//!     let pipeline = TracePipeline::start(config).await?;
//!
//!     let mut span = Span::new(1, 1, None, "handle.request".into(), SpanKind::Server);
//!     span.finish(SpanStatus::Ok);
//!     pipeline.enqueue(span);
//!
//!     let summary = pipeline.shutdown(Duration::from_secs(5)).await;
//!     println!("sent={} dropped={}", summary.sent, summary.dropped);
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod exporter;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod scheduler;
pub mod span;
pub mod transport;
pub mod wire;

// Re-export main types
pub use buffer::SpanBuffer;
pub use config::{BackoffConfig, ConfigError, PipelineConfig, TransportKind};
pub use exporter::{ConsoleExporter, ExportError, SpanExporter, SpanExporterBoxed};
pub use metrics::PipelineMetrics;
pub use pipeline::{ShutdownSummary, TracePipeline};
pub use retry::{DeliveryOutcome, DropReason, RetryPolicy};
pub use scheduler::BatchScheduler;
pub use span::{AttributeValue, Span, SpanBatch, SpanEvent, SpanKind, SpanStatus};
pub use transport::{OtlpGrpcExporter, OtlpHttpExporter};
