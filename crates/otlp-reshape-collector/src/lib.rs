//! Collector running OTLP metric batches through the reshaping pipeline.
//!
//! Export requests are decoded from protobuf files, aggregated by the configured rules and
//! cached in a last-value accumulator whose snapshot can be rendered as text.

mod config;
mod error;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

pub use config::CollectorConfig;
pub use error::Error;
use itertools::Itertools;
use opentelemetry_proto::tonic::{
    collector::metrics::v1::ExportMetricsServiceRequest,
    common::v1::KeyValue,
    metrics::v1::{metric::Data, number_data_point, NumberDataPoint},
};
use otlp_reshape_core::{
    attributes::value_as_string, sanitize_metric_name, AggregatingConsumer, CollectedSeries,
    MetricAccumulator, MetricsAggregator, MetricsPipeline,
};
use prost::Message;

/// Builds the pipeline described by a validated configuration.
pub fn new_pipeline(config: &CollectorConfig) -> MetricsPipeline {
    AggregatingConsumer::new(
        MetricsAggregator::new(&config.aggregator),
        MetricAccumulator::from_config(&config.accumulator),
    )
}

/// Reads one protobuf encoded export request.
pub fn read_export_request(path: &Path) -> Result<ExportMetricsServiceRequest, Error> {
    let bytes = std::fs::read(path).map_err(|source| Error::FileError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ExportMetricsServiceRequest::decode(bytes.as_slice())?)
}

/// Decodes and consumes every input file, each on the blocking pool.
///
/// Returns the number of data points accumulated. The first failing file fails the whole
/// ingest, after every file has been attempted.
pub async fn ingest_files(pipeline: Arc<MetricsPipeline>, inputs: Vec<PathBuf>) -> Result<usize, Error> {
    let tasks: Vec<_> = inputs
        .into_iter()
        .map(|path| {
            let pipeline = pipeline.clone();
            tokio::task::spawn_blocking(move || -> Result<usize, Error> {
                let request = read_export_request(&path)?;
                let stored = pipeline.consume_request(request);
                tracing::info!(path = %path.display(), stored, "ingested export request");
                Ok(stored)
            })
        })
        .collect();
    let mut total = 0;
    let mut first_error = None;
    for task in tasks {
        match task.await? {
            Ok(stored) => total += stored,
            Err(e) => {
                tracing::error!(error = %e, "failed to ingest export request");
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(total),
    }
}

/// Evicts expired series every `interval` until Ctrl-C.
pub async fn sweep_expired(pipeline: Arc<MetricsPipeline>, interval: Duration) -> Result<(), Error> {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let deleted = pipeline.downstream().clean_expired();
                tracing::debug!(deleted_count = deleted, remaining = pipeline.downstream().live_count(), "swept expired series");
            },
            r = tokio::signal::ctrl_c() => {
                r?;
                tracing::info!("shutting down");
                return Ok(());
            }
        }
    }
}

/// Renders a snapshot, one line per series: `name{labels} value`.
///
/// Labels are the resource attributes followed by the point attributes. Histograms render
/// `sum` and `count` series; shapes without a scalar are skipped.
pub fn render_snapshot(snapshot: &[CollectedSeries]) -> String {
    let mut out = String::new();
    for series in snapshot {
        let name = sanitize_metric_name(&series.metric.name);
        let labels = |point_attributes: &[KeyValue]| {
            series
                .resource_attributes
                .iter()
                .chain(point_attributes)
                .map(|kv| {
                    format!(
                        "{}=\"{}\"",
                        sanitize_metric_name(&kv.key),
                        escape_label_value(&value_as_string(kv.value.as_ref()))
                    )
                })
                .join(",")
        };
        match &series.metric.data {
            Some(Data::Gauge(g)) => {
                for p in &g.data_points {
                    out.push_str(&format!("{name}{{{}}} {}\n", labels(&p.attributes), number(p)));
                }
            }
            Some(Data::Sum(s)) => {
                for p in &s.data_points {
                    out.push_str(&format!("{name}{{{}}} {}\n", labels(&p.attributes), number(p)));
                }
            }
            Some(Data::Histogram(h)) => {
                for p in &h.data_points {
                    let labels = labels(&p.attributes);
                    out.push_str(&format!(
                        "{name}_sum{{{labels}}} {}\n",
                        p.sum.unwrap_or_default()
                    ));
                    out.push_str(&format!("{name}_count{{{labels}}} {}\n", p.count));
                }
            }
            _ => {}
        }
    }
    out
}

/// Escapes a label value for the exposition format: backslash, double quote and newline.
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn number(point: &NumberDataPoint) -> String {
    match point.value {
        Some(number_data_point::Value::AsDouble(v)) => v.to_string(),
        Some(number_data_point::Value::AsInt(v)) => v.to_string(),
        None => "0".to_owned(),
    }
}
