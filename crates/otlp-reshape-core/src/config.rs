//! Configuration for the aggregation rule engine and the metric accumulator.
//!
//! Both configurations are validated once, before any metric is processed.

use std::{collections::BTreeMap, fmt, time::Duration};

use regex::Regex;
use serde::Deserialize;

use crate::Error;

/// Default amount of time an accumulated series lives without being refreshed.
const DEFAULT_METRIC_EXPIRATION: Duration = Duration::from_secs(5 * 60);

/// Configuration for the cross-resource aggregation rule engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Labels used to build group keys, shared by every rule. Order matters.
    pub group_by_labels: Vec<String>,
    /// Marker attributes stamped on every synthesized resource.
    pub output_resource_attributes: BTreeMap<String, String>,
    /// Rules, applied in order.
    pub aggregation_rules: Vec<AggregationRule>,
}

/// A single aggregation rule.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AggregationRule {
    /// Metric name, or regular expression, selecting the inputs.
    pub metric_pattern: String,
    /// How `metric_pattern` is compared against metric names.
    pub match_type: MatchType,
    /// Name of the synthesized metric (sanitized before use).
    pub output_metric_name: String,
    /// How values within a group are combined.
    pub aggregation_type: AggregationType,
    /// Keep the matched input metrics in the batch.
    pub preserve_original_metrics: bool,
    /// Shape of the synthesized metric.
    pub output_metric_type: OutputMetricType,
}

/// How a rule pattern is matched against metric names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    #[serde(alias = "")]
    Strict,
    Regex,
    #[serde(other)]
    Unrecognized,
}

/// How the values of a group are combined into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    #[default]
    #[serde(alias = "")]
    Sum,
    Mean,
    Min,
    Max,
    Count,
    #[serde(other)]
    Unrecognized,
}

/// Shape of a synthesized metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMetricType {
    #[default]
    #[serde(alias = "")]
    Gauge,
    Sum,
    Histogram,
    #[serde(other)]
    Unrecognized,
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationType::Sum => "sum",
            AggregationType::Mean => "mean",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
            AggregationType::Count => "count",
            AggregationType::Unrecognized => "unrecognized",
        };
        f.write_str(name)
    }
}

impl AggregatorConfig {
    /// Checks the configuration is usable, reporting the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.group_by_labels.is_empty() {
            return Err(Error::EmptyGroupByLabels);
        }
        if self.output_resource_attributes.is_empty() {
            return Err(Error::EmptyOutputResourceAttributes);
        }
        if self.aggregation_rules.is_empty() {
            return Err(Error::NoAggregationRules);
        }
        for (index, rule) in self.aggregation_rules.iter().enumerate() {
            rule.validate(index)?;
        }
        Ok(())
    }
}

impl AggregationRule {
    fn validate(&self, index: usize) -> Result<(), Error> {
        if self.metric_pattern.is_empty() {
            return Err(Error::EmptyMetricPattern(index));
        }
        match self.match_type {
            MatchType::Strict => {}
            MatchType::Regex => {
                Regex::new(&self.metric_pattern).map_err(|source| Error::InvalidRulePattern {
                    index,
                    pattern: self.metric_pattern.clone(),
                    source,
                })?;
            }
            MatchType::Unrecognized => return Err(Error::InvalidMatchType(index)),
        }
        if self.output_metric_name.is_empty() {
            return Err(Error::EmptyOutputMetricName(index));
        }
        if self.aggregation_type == AggregationType::Unrecognized {
            return Err(Error::InvalidAggregationType(index));
        }
        if self.output_metric_type == OutputMetricType::Unrecognized {
            return Err(Error::InvalidOutputMetricType(index));
        }
        Ok(())
    }
}

/// Configuration for the last-value metric accumulator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccumulatorConfig {
    /// How long a series survives without being refreshed.
    #[serde(with = "humantime_serde")]
    pub metric_expiration: Duration,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            metric_expiration: DEFAULT_METRIC_EXPIRATION,
        }
    }
}

impl AccumulatorConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.metric_expiration.is_zero() {
            return Err(Error::ZeroMetricExpiration);
        }
        Ok(())
    }
}
