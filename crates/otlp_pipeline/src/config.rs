//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors detected while validating a [`PipelineConfig`].
///
/// These are surfaced to the caller of `TracePipeline::start`; the pipeline
/// never starts with a bad configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The collector endpoint is empty.
    #[error("endpoint must not be empty")]
    EmptyEndpoint,
    /// A size or count option that must be strictly positive is zero.
    #[error("{0} must be strictly positive")]
    NonPositive(&'static str),
    /// The transport client could not be constructed.
    #[error("transport initialization failed: {0}")]
    TransportInit(String),
}

/// Which transport carries exported batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// gRPC-like length-delimited framing over a TCP stream
    Grpc,
    /// HTTP POST of the OTLP-JSON payload
    Http,
    /// Human-readable dump to stdout (debugging)
    Console,
}

/// Exponential backoff parameters for retrying failed exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay before the first retry.
    pub base: Duration,
    /// Maximum delay between retries (caps exponential growth).
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            max: Duration::from_secs(10),
        }
    }
}

/// Immutable configuration snapshot for the export pipeline.
///
/// Constructed once at startup and never mutated; reconfiguration means
/// shutting the pipeline down and starting a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Collector address (`host:port` for gRPC, full URL for HTTP).
    pub endpoint: String,
    /// Transport variant.
    pub transport: TransportKind,
    /// Headers sent with every export (e.g. bearer tokens for SaaS backends).
    pub headers: Vec<(String, String)>,
    /// Span count that triggers a flush.
    pub batch_size: usize,
    /// Maximum time between flushes, regardless of batch size.
    pub flush_interval: Duration,
    /// Buffer capacity; spans beyond this are dropped and counted.
    pub max_queue_size: usize,
    /// Bound on a single send attempt.
    pub export_timeout: Duration,
    /// Retry attempts after the initial send (0 = no retries).
    pub max_retries: u32,
    /// Backoff parameters for retryable failures.
    pub backoff: BackoffConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4318/v1/traces".to_string(),
            transport: TransportKind::Http,
            headers: Vec::new(),
            batch_size: 512,
            flush_interval: Duration::from_secs(5),
            max_queue_size: 2048,
            export_timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff: BackoffConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Checks the invariants required before the pipeline may start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::NonPositive("batch_size"));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::NonPositive("flush_interval"));
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::NonPositive("max_queue_size"));
        }
        if self.export_timeout.is_zero() {
            return Err(ConfigError::NonPositive("export_timeout"));
        }
        Ok(())
    }

    /// Sets the collector endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the transport variant.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Adds a header sent with every export.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Sets the flush threshold in spans.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the maximum time between flushes.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the buffer capacity.
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Sets the per-attempt export timeout.
    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }

    /// Sets the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff parameters.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let config = PipelineConfig::default().with_endpoint("");
        assert_eq!(config.validate(), Err(ConfigError::EmptyEndpoint));
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = PipelineConfig::default().with_batch_size(0);
        assert_eq!(config.validate(), Err(ConfigError::NonPositive("batch_size")));

        let config = PipelineConfig::default().with_flush_interval(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive("flush_interval"))
        );

        let config = PipelineConfig::default().with_max_queue_size(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive("max_queue_size"))
        );

        let config = PipelineConfig::default().with_export_timeout(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive("export_timeout"))
        );
    }

    #[test]
    fn test_builder_headers() {
        let config = PipelineConfig::default()
            .with_transport(TransportKind::Grpc)
            .with_header("authorization", "Bearer token")
            .with_header("x-tenant", "demo");
        assert_eq!(config.transport, TransportKind::Grpc);
        assert_eq!(config.headers.len(), 2);
        assert_eq!(config.headers[0].0, "authorization");
    }

    #[test]
    fn test_transport_kind_serde() {
        let json = serde_json::to_string(&TransportKind::Grpc).unwrap();
        assert_eq!(json, "\"grpc\"");
        let kind: TransportKind = serde_json::from_str("\"console\"").unwrap();
        assert_eq!(kind, TransportKind::Console);
    }
}
