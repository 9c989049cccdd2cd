//! Sum output

use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, number_data_point, AggregationTemporality, NumberDataPoint, Sum,
};

use super::OutputPoint;

/// A cumulative, monotonic sum starting at the earliest source start time.
pub(super) fn synthesize(point: OutputPoint) -> Data {
    Data::Sum(Sum {
        data_points: vec![NumberDataPoint {
            attributes: point.attributes,
            start_time_unix_nano: point.start_time_unix_nano,
            time_unix_nano: point.time_unix_nano,
            exemplars: Vec::new(),
            flags: 0,
            value: Some(number_data_point::Value::AsDouble(point.value)),
        }],
        aggregation_temporality: AggregationTemporality::Cumulative as i32,
        is_monotonic: true,
    })
}
