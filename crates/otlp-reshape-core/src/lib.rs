//! OTLP metric reshaping.
//!
//! Two stages operate on batches of OTLP resource metrics:
//!
//! - [`MetricsAggregator`] combines metric values across resources according to configured
//!   rules, appending synthesized resources and optionally removing the inputs.
//! - [`MetricAccumulator`] keeps the latest value of every series for pull-based scraping,
//!   with expiry and selective deletion.
//!
//! [`MetricsPipeline`] chains the two.

pub mod accumulator;
pub mod aggregation;
pub mod attributes;
mod cleanup;
mod config;
mod error;
pub mod group_key;
mod pipeline;
mod processor;

// Exposes the rule engine.
pub use processor::{sanitize_metric_name, MetricsAggregator};
// Exposes the last-value cache.
pub use accumulator::{CollectedSeries, MetricAccumulator};
// Exposes the cleanup surface of the cache.
pub use cleanup::{CleanupRequest, CleanupResponse};
// Exposes configuration and its validation.
pub use config::{
    AccumulatorConfig, AggregationRule, AggregationType, AggregatorConfig, MatchType,
    OutputMetricType,
};
pub use error::Error;
pub use group_key::{build_group_key, GroupKey};
pub use pipeline::{AggregatingConsumer, MetricsConsumer, MetricsPipeline};
