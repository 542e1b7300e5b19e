//! End-to-end demo of the trace export pipeline.
//!
//! Spawns several producer tasks generating realistic spans, runs them
//! through the pipeline with the console transport, and prints the final
//! accounting.
//!
//! ```bash
//! cargo run -p otlp_pipeline --bin demo
//!
//! # fewer producers, fewer spans
//! cargo run -p otlp_pipeline --bin demo -- --quick
//! ```

use otlp_pipeline::{
    AttributeValue, PipelineConfig, Span, SpanKind, SpanStatus, TracePipeline, TransportKind,
};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let quick = args.contains(&"--quick".to_string());
    let (num_producers, spans_per_producer) = if quick { (4, 25) } else { (8, 100) };

    let config = PipelineConfig::default()
        .with_endpoint("console://stdout")
        .with_transport(TransportKind::Console)
        .with_batch_size(100)
        .with_flush_interval(Duration::from_millis(200))
        .with_max_queue_size(4096);

    let pipeline = Arc::new(TracePipeline::start(config).await?);
    let start = Instant::now();

    let mut handles = Vec::new();
    for producer_id in 0..num_producers {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            run_producer(producer_id, spans_per_producer, &pipeline).await
        }));
    }

    let mut submitted = 0u64;
    let mut rejected = 0u64;
    for handle in handles {
        let (ok, full) = handle.await?;
        submitted += ok;
        rejected += full;
    }

    let summary = pipeline.shutdown(Duration::from_secs(5)).await;
    let elapsed = start.elapsed();

    let metrics = pipeline.metrics();
    println!();
    println!("producers:        {}", num_producers);
    println!("spans submitted:  {}", submitted);
    println!("spans rejected:   {}", rejected);
    println!("spans sent:       {}", summary.sent);
    println!("spans dropped:    {}", summary.dropped);
    println!("batches sent:     {}", metrics.batches_sent());
    println!("retry attempts:   {}", metrics.retry_attempts());
    println!("elapsed:          {:?}", elapsed);
    println!(
        "throughput:       {:.0} spans/sec",
        submitted as f64 / elapsed.as_secs_f64()
    );

    Ok(())
}

/// Generates spans for a simulated service and feeds them to the pipeline.
/// Returns (accepted, rejected) counts.
async fn run_producer(producer_id: u64, span_count: u64, pipeline: &TracePipeline) -> (u64, u64) {
    let operations = [
        ("http.request", SpanKind::Server),
        ("db.query", SpanKind::Client),
        ("cache.get", SpanKind::Client),
        ("process.data", SpanKind::Internal),
    ];
    let service_name = format!("service-{}", producer_id % 4);

    let mut accepted = 0u64;
    let mut rejected = 0u64;

    for seq in 0..span_count {
        let (operation, kind) = operations[(seq % operations.len() as u64) as usize];
        let parent = (seq % 5 != 0).then(|| span_id(producer_id, seq.saturating_sub(1)));

        let mut span = Span::new(
            trace_id(producer_id, seq),
            span_id(producer_id, seq),
            parent,
            operation.to_string(),
            kind,
        );
        span.set_attribute(
            "service.name",
            AttributeValue::String(service_name.clone()),
        );
        span.set_attribute(
            "http.status_code",
            AttributeValue::Int(if seq % 10 == 9 { 500 } else { 200 }),
        );

        tokio::time::sleep(Duration::from_millis(seq % 3 + 1)).await;

        let status = if seq % 10 == 9 {
            span.set_attribute("error", AttributeValue::Bool(true));
            SpanStatus::Error
        } else {
            SpanStatus::Ok
        };
        span.finish(status);

        if pipeline.enqueue(span) {
            accepted += 1;
        } else {
            rejected += 1;
        }
    }

    (accepted, rejected)
}

fn trace_id(producer_id: u64, seq: u64) -> u128 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    (u128::from(producer_id) << 112) | (u128::from(nanos) << 48) | u128::from(seq)
}

fn span_id(producer_id: u64, seq: u64) -> u64 {
    (producer_id << 48) | (seq & 0xFFFF_FFFF_FFFF)
}
