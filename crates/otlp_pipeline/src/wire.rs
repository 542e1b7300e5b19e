//! OTLP-JSON wire encoding for span batches.
//!
//! Produces the `resourceSpans` / `scopeSpans` structure the OTLP/HTTP JSON
//! contract expects. All spans of a batch share one resource group so the
//! buffer's FIFO order is preserved verbatim in the payload.

use crate::span::{AttributeValue, Span, SpanBatch, SpanKind, SpanStatus};
use serde_json::{json, Value};

/// Instrumentation scope name reported in every payload.
const SCOPE_NAME: &str = "otlp_pipeline";

/// Encodes a batch as an OTLP-JSON export request body.
pub fn encode_batch(batch: &SpanBatch) -> Value {
    let spans: Vec<Value> = batch.spans.iter().map(encode_span).collect();
    json!({
        "resourceSpans": [{
            "resource": { "attributes": [] },
            "scopeSpans": [{
                "scope": { "name": SCOPE_NAME },
                "spans": spans,
            }],
        }],
    })
}

/// Encodes a batch to bytes for transmission.
pub fn encode_batch_bytes(batch: &SpanBatch) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&encode_batch(batch))
}

fn encode_span(span: &Span) -> Value {
    json!({
        "traceId": format!("{:032x}", span.trace_id),
        "spanId": format!("{:016x}", span.span_id),
        "parentSpanId": span.parent_span_id.map(|id| format!("{:016x}", id)),
        "name": span.name,
        "kind": kind_code(span.kind),
        "startTimeUnixNano": span.start_time.to_string(),
        "endTimeUnixNano": span.end_time.to_string(),
        "attributes": encode_attributes(&span.attributes),
        "events": span.events.iter().map(|event| json!({
            "name": event.name,
            "timeUnixNano": event.time_unix_nano.to_string(),
            "attributes": encode_attributes(&event.attributes),
        })).collect::<Vec<_>>(),
        "status": status_value(span.status),
    })
}

fn encode_attributes(attributes: &[(String, AttributeValue)]) -> Vec<Value> {
    attributes
        .iter()
        .map(|(key, value)| {
            json!({
                "key": key,
                "value": attribute_value(value),
            })
        })
        .collect()
}

fn attribute_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::String(s) => json!({ "stringValue": s }),
        AttributeValue::Int(i) => json!({ "intValue": i.to_string() }),
        AttributeValue::Float(f) => json!({ "doubleValue": f }),
        AttributeValue::Bool(b) => json!({ "boolValue": b }),
        AttributeValue::Array(items) => json!({
            "arrayValue": {
                "values": items.iter()
                    .map(|item| json!({ "stringValue": item }))
                    .collect::<Vec<_>>(),
            }
        }),
    }
}

fn kind_code(kind: SpanKind) -> u8 {
    match kind {
        SpanKind::Internal => 1,
        SpanKind::Server => 2,
        SpanKind::Client => 3,
        SpanKind::Producer => 4,
        SpanKind::Consumer => 5,
    }
}

fn status_value(status: SpanStatus) -> Value {
    match status {
        SpanStatus::Unset => json!({}),
        SpanStatus::Ok => json!({ "code": 1 }),
        SpanStatus::Error => json!({ "code": 2 }),
    }
}
