//! Transport implementations for the OTLP wire contract.
//!
//! Two network transports plus the console variant from `exporter`:
//!
//! - [`OtlpHttpExporter`]: HTTP POST of the OTLP-JSON payload.
//! - [`OtlpGrpcExporter`]: gRPC-style length-delimited frames over a TCP
//!   stream with a one-byte status reply.
//!
//! Transports own their sockets/clients exclusively; nothing else in the
//! pipeline touches connection state.

use crate::config::{ConfigError, PipelineConfig, TransportKind};
use crate::exporter::{ConsoleExporter, ExportError, SpanExporter, SpanExporterBoxed};
use crate::span::SpanBatch;
use crate::wire;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Builds the exporter selected by the configuration's transport variant.
pub(crate) fn build_exporter(
    config: &PipelineConfig,
) -> Result<Box<dyn SpanExporterBoxed>, ConfigError> {
    match config.transport {
        TransportKind::Http => {
            let exporter = OtlpHttpExporter::new(
                config.endpoint.clone(),
                config.headers.clone(),
                config.export_timeout,
            )?;
            Ok(Box::new(exporter))
        }
        TransportKind::Grpc => Ok(Box::new(OtlpGrpcExporter::new(
            config.endpoint.clone(),
            config.headers.clone(),
        ))),
        TransportKind::Console => Ok(Box::new(ConsoleExporter::new(true))),
    }
}

// =============================================================================
// HTTP TRANSPORT
// =============================================================================

/// Exports batches as OTLP-JSON over HTTP POST.
pub struct OtlpHttpExporter {
    client: reqwest::Client,
    endpoint: String,
    headers: Vec<(String, String)>,
}

impl OtlpHttpExporter {
    /// Creates an HTTP exporter with a per-request timeout.
    pub fn new(
        endpoint: String,
        headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::TransportInit(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            headers,
        })
    }
}

impl SpanExporter for OtlpHttpExporter {
    async fn export(&self, batch: SpanBatch) -> Result<(), ExportError> {
        let payload = wire::encode_batch(&batch);

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.json(&payload).send().await.map_err(|e| {
            if e.is_timeout() {
                ExportError::Timeout
            } else {
                ExportError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(ExportError::Status {
            code: status.as_u16(),
            message,
        })
    }

    fn name(&self) -> &str {
        "otlp-http"
    }
}

// =============================================================================
// GRPC-LIKE TRANSPORT
// =============================================================================

/// Frame status replies understood from the collector.
const STATUS_OK: u8 = 0;
const STATUS_RETRYABLE: u8 = 1;
const STATUS_FATAL: u8 = 2;

/// Exports batches over a TCP stream using gRPC-style framing.
///
/// Each call writes one message frame: a compression flag byte (always 0),
/// a big-endian u32 payload length, then the payload. The payload carries
/// call metadata (the configured headers) alongside the OTLP-JSON body.
/// The collector answers with a single status byte.
///
/// One connection is cached behind an async mutex and re-dialed after any
/// I/O error; a fatal status reply keeps the connection, the collector
/// answered correctly.
pub struct OtlpGrpcExporter {
    endpoint: String,
    headers: Vec<(String, String)>,
    connection: Mutex<Option<TcpStream>>,
}

impl OtlpGrpcExporter {
    /// Creates a gRPC-like exporter for a `host:port` endpoint.
    pub fn new(endpoint: String, headers: Vec<(String, String)>) -> Self {
        Self {
            endpoint,
            headers,
            connection: Mutex::new(None),
        }
    }

    fn encode_frame_payload(&self, batch: &SpanBatch) -> Result<Vec<u8>, ExportError> {
        let envelope = json!({
            "metadata": self.headers,
            "body": wire::encode_batch(batch),
        });
        serde_json::to_vec(&envelope).map_err(|e| ExportError::Serialization(e.to_string()))
    }

    async fn roundtrip(stream: &mut TcpStream, payload: &[u8]) -> Result<u8, std::io::Error> {
        stream.write_u8(0).await?;
        stream.write_u32(payload.len() as u32).await?;
        stream.write_all(payload).await?;
        stream.flush().await?;
        stream.read_u8().await
    }
}

impl SpanExporter for OtlpGrpcExporter {
    async fn export(&self, batch: SpanBatch) -> Result<(), ExportError> {
        let payload = self.encode_frame_payload(&batch)?;

        let mut guard = self.connection.lock().await;
        let stream = match guard.as_mut() {
            Some(stream) => stream,
            None => {
                let stream = TcpStream::connect(&self.endpoint)
                    .await
                    .map_err(|e| ExportError::Transport(e.to_string()))?;
                guard.insert(stream)
            }
        };
        match Self::roundtrip(stream, &payload).await {
            Ok(STATUS_OK) => Ok(()),
            Ok(STATUS_RETRYABLE) => Err(ExportError::Transport(
                "collector signalled retryable failure".to_string(),
            )),
            Ok(STATUS_FATAL) => Err(ExportError::Rejected(
                "collector rejected batch".to_string(),
            )),
            Ok(other) => {
                // Unknown reply, drop the connection and treat as transient
                *guard = None;
                Err(ExportError::Transport(format!(
                    "unknown collector status {}",
                    other
                )))
            }
            Err(e) => {
                *guard = None;
                Err(ExportError::Transport(e.to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        "otlp-grpc"
    }
}
