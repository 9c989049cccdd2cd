//! Histogram output
//!
//! Only the summary statistics are carried; no bucket boundaries are synthesized.

use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, AggregationTemporality, Histogram, HistogramDataPoint,
};

use super::OutputPoint;

/// A bucketless histogram whose sum is the aggregated value and whose count is the number
/// of contributing points.
pub(super) fn synthesize(point: OutputPoint) -> Data {
    Data::Histogram(Histogram {
        data_points: vec![HistogramDataPoint {
            attributes: point.attributes,
            start_time_unix_nano: point.start_time_unix_nano,
            time_unix_nano: point.time_unix_nano,
            count: point.count,
            sum: Some(point.value),
            ..Default::default()
        }],
        aggregation_temporality: AggregationTemporality::Cumulative as i32,
    })
}
