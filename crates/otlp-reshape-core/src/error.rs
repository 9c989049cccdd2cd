use thiserror::Error;

/// An error from the metric reshaping core.
#[derive(Error, Debug)]
pub enum Error {
    #[error("group_by_labels cannot be empty - at least one label must be specified for grouping")]
    EmptyGroupByLabels,

    #[error("output_resource_attributes cannot be empty - required to distinguish aggregated metrics from original metrics")]
    EmptyOutputResourceAttributes,

    #[error("at least one aggregation rule must be specified")]
    NoAggregationRules,

    #[error("aggregation rule {0}: metric_pattern cannot be empty")]
    EmptyMetricPattern(usize),

    #[error("aggregation rule {0}: invalid match_type, must be 'strict' or 'regex'")]
    InvalidMatchType(usize),

    #[error("aggregation rule {index}: invalid regex pattern '{pattern}': {source}")]
    InvalidRulePattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("aggregation rule {0}: output_metric_name cannot be empty")]
    EmptyOutputMetricName(usize),

    #[error("aggregation rule {0}: invalid aggregation_type, must be one of: sum, mean, min, max, count")]
    InvalidAggregationType(usize),

    #[error("aggregation rule {0}: invalid output_metric_type, must be one of: gauge, sum, histogram")]
    InvalidOutputMetricType(usize),

    #[error("metric_expiration must be greater than zero")]
    ZeroMetricExpiration,

    /// A pattern that could not be compiled when it was needed.
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("filters are required for label-based cleanup")]
    MissingCleanupFilters,

    #[error("pattern is required for name-based cleanup")]
    MissingCleanupPattern,
}
