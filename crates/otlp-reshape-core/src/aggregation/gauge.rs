//! Gauge output

use opentelemetry_proto::tonic::metrics::v1::{metric::Data, number_data_point, Gauge, NumberDataPoint};

use super::OutputPoint;

/// A gauge carrying the aggregated value at the latest source timestamp.
pub(super) fn synthesize(point: OutputPoint) -> Data {
    Data::Gauge(Gauge {
        data_points: vec![NumberDataPoint {
            attributes: point.attributes,
            // Gauges have no start time.
            start_time_unix_nano: 0,
            time_unix_nano: point.time_unix_nano,
            exemplars: Vec::new(),
            flags: 0,
            value: Some(number_data_point::Value::AsDouble(point.value)),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::string_kv;

    #[test]
    fn test_gauge_output() {
        let data = synthesize(OutputPoint {
            attributes: vec![string_kv("pathKey", "/v1")],
            value: 33.,
            count: 2,
            start_time_unix_nano: 100,
            time_unix_nano: 200,
        });
        if let Data::Gauge(gauge) = data {
            assert_eq!(gauge.data_points.len(), 1);
            let dp = &gauge.data_points[0];
            assert_eq!(dp.start_time_unix_nano, 0);
            assert_eq!(dp.time_unix_nano, 200);
            assert_eq!(dp.attributes, vec![string_kv("pathKey", "/v1")]);
            assert_eq!(dp.value, Some(number_data_point::Value::AsDouble(33.)));
        } else {
            panic!("Expected Gauge data");
        }
    }
}
