//! Value extraction, combination and output synthesis for aggregation rules.
//!
//! Matched metrics are never copied: each data point is carried through grouping as a
//! [`SourcePoint`] borrowing from the batch, tagged with the shape it came from.

mod gauge;
mod histogram;
mod sum;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use opentelemetry_proto::tonic::{
    common::v1::KeyValue,
    metrics::v1::{
        metric::Data, number_data_point, HistogramDataPoint, Metric, NumberDataPoint,
    },
};

use crate::config::{AggregationType, OutputMetricType};

/// Start time fallback distance when no source point carries one.
const START_TIME_FALLBACK: Duration = Duration::from_secs(60);

/// A borrowed data point of a matched metric.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SourcePoint<'a> {
    Gauge(&'a NumberDataPoint),
    Sum(&'a NumberDataPoint),
    Histogram(&'a HistogramDataPoint),
}

impl<'a> SourcePoint<'a> {
    /// Explodes a metric into its data points. Shapes we do not aggregate yield nothing.
    pub(crate) fn from_metric(metric: &'a Metric) -> Vec<SourcePoint<'a>> {
        match &metric.data {
            Some(Data::Gauge(gauge)) => gauge.data_points.iter().map(SourcePoint::Gauge).collect(),
            Some(Data::Sum(sum)) => sum.data_points.iter().map(SourcePoint::Sum).collect(),
            Some(Data::Histogram(histogram)) => histogram
                .data_points
                .iter()
                .map(SourcePoint::Histogram)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn attributes(&self) -> &'a [KeyValue] {
        match self {
            SourcePoint::Gauge(p) | SourcePoint::Sum(p) => &p.attributes,
            SourcePoint::Histogram(p) => &p.attributes,
        }
    }

    /// The scalar this point contributes: the number for gauges and sums, the sum for
    /// histograms. Integers are widened to floating point.
    pub(crate) fn value(&self) -> Option<f64> {
        match self {
            SourcePoint::Gauge(p) | SourcePoint::Sum(p) => match p.value {
                Some(number_data_point::Value::AsDouble(v)) => Some(v),
                Some(number_data_point::Value::AsInt(v)) => Some(v as f64),
                None => None,
            },
            SourcePoint::Histogram(p) => Some(p.sum.unwrap_or_default()),
        }
    }

    pub(crate) fn time_unix_nano(&self) -> u64 {
        match self {
            SourcePoint::Gauge(p) | SourcePoint::Sum(p) => p.time_unix_nano,
            SourcePoint::Histogram(p) => p.time_unix_nano,
        }
    }

    /// The timestamp this point offers as a start time: gauges only have their sample time,
    /// cumulative shapes have a real start time.
    pub(crate) fn start_time_unix_nano(&self) -> u64 {
        match self {
            SourcePoint::Gauge(p) => p.time_unix_nano,
            SourcePoint::Sum(p) => p.start_time_unix_nano,
            SourcePoint::Histogram(p) => p.start_time_unix_nano,
        }
    }
}

/// Combines values according to the aggregation type.
///
/// An empty input yields 0, as does an unrecognized aggregation type.
pub fn aggregate(values: &[f64], aggregation: AggregationType) -> f64 {
    let Some((first, rest)) = values.split_first() else {
        return 0.;
    };
    match aggregation {
        AggregationType::Sum => values.iter().sum(),
        AggregationType::Mean => values.iter().sum::<f64>() / values.len() as f64,
        AggregationType::Min => rest.iter().fold(*first, |min, v| if *v < min { *v } else { min }),
        AggregationType::Max => rest.iter().fold(*first, |max, v| if *v > max { *v } else { max }),
        AggregationType::Count => values.len() as f64,
        AggregationType::Unrecognized => 0.,
    }
}

/// Latest sample time across points, or `now` if none is set.
pub(crate) fn latest_timestamp<'r, 'a: 'r>(
    points: impl IntoIterator<Item = &'r SourcePoint<'a>>,
    now_unix_nano: u64,
) -> u64 {
    match points.into_iter().map(|p| p.time_unix_nano()).max() {
        Some(ts) if ts > 0 => ts,
        _ => now_unix_nano,
    }
}

/// Earliest non-zero start time across points, or one minute before `now` if none is set.
pub(crate) fn earliest_start_timestamp<'r, 'a: 'r>(
    points: impl IntoIterator<Item = &'r SourcePoint<'a>>,
    now_unix_nano: u64,
) -> u64 {
    points
        .into_iter()
        .map(|p| p.start_time_unix_nano())
        .filter(|ts| *ts > 0)
        .min()
        .unwrap_or_else(|| {
            now_unix_nano.saturating_sub(START_TIME_FALLBACK.as_nanos() as u64)
        })
}

/// Current time in nanoseconds since the unix epoch.
pub(crate) fn now_unix_nano() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// The single data point of a synthesized metric.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutputPoint {
    pub attributes: Vec<KeyValue>,
    pub value: f64,
    /// Number of contributing source points.
    pub count: u64,
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
}

/// Builds the metric data for a synthesized point in the requested shape.
///
/// An unrecognized output type degrades to a gauge.
pub(crate) fn synthesize(output: OutputMetricType, point: OutputPoint) -> Data {
    match output {
        OutputMetricType::Gauge => gauge::synthesize(point),
        OutputMetricType::Sum => sum::synthesize(point),
        OutputMetricType::Histogram => histogram::synthesize(point),
        OutputMetricType::Unrecognized => {
            tracing::warn!("unrecognized output metric type, emitting a gauge");
            gauge::synthesize(point)
        }
    }
}
