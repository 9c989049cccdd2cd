//! Timeseries identity helpers.

use opentelemetry_proto::tonic::{
    common::v1::{InstrumentationScope, KeyValue},
    metrics::v1::metric::Data,
};

use crate::attributes::sorted_string_pairs;

/// The data shape of a cached series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricShape {
    Gauge,
    Sum,
    Histogram,
    ExponentialHistogram,
    Summary,
}

impl MetricShape {
    pub fn of(data: &Data) -> MetricShape {
        match data {
            Data::Gauge(_) => MetricShape::Gauge,
            Data::Sum(_) => MetricShape::Sum,
            Data::Histogram(_) => MetricShape::Histogram,
            Data::ExponentialHistogram(_) => MetricShape::ExponentialHistogram,
            Data::Summary(_) => MetricShape::Summary,
        }
    }
}

/// A hashable time series identity.
///
/// Attributes are compared by their rendered string value, sorted by key, so values of
/// different types that render the same are the same series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeSeriesIdentity {
    name: String,
    shape: MetricShape,
    scope_name: String,
    scope_version: String,
    resource_attributes: Vec<(String, String)>,
    point_attributes: Vec<(String, String)>,
}

impl TimeSeriesIdentity {
    /// Constructs a new timeseries identity for one data point.
    pub fn new(
        name: &str,
        shape: MetricShape,
        scope: Option<&InstrumentationScope>,
        resource_attributes: &[KeyValue],
        point_attributes: &[KeyValue],
    ) -> TimeSeriesIdentity {
        TimeSeriesIdentity {
            name: name.to_owned(),
            shape,
            scope_name: scope.map(|s| s.name.clone()).unwrap_or_default(),
            scope_version: scope.map(|s| s.version.clone()).unwrap_or_default(),
            resource_attributes: sorted_string_pairs(resource_attributes),
            point_attributes: sorted_string_pairs(point_attributes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
