//! The aggregation rule engine.
//!
//! Rules are applied to a batch one after another. Each rule matches metrics by name,
//! groups their data points by the configured labels, and appends one synthesized
//! resource per group carrying the combined value. Unless asked to preserve them, the
//! matched metrics are then removed from every resource that is not itself synthesized.

use std::collections::BTreeMap;

use opentelemetry_proto::tonic::{
    collector::metrics::v1::ExportMetricsServiceRequest,
    common::v1::{InstrumentationScope, KeyValue},
    metrics::v1::{Metric, ResourceMetrics, ScopeMetrics},
    resource::v1::Resource,
};
use regex::Regex;

use crate::{
    aggregation::{self, OutputPoint, SourcePoint},
    attributes::{get_string, put_string, resource_attributes},
    config::{AggregationRule, AggregatorConfig, MatchType},
    group_key::GroupKey,
    Error,
};

/// Name of the scope carried by synthesized resources.
const SCOPE_NAME: &str = env!("CARGO_PKG_NAME");
const SCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compiled form of a rule's name pattern.
#[derive(Debug)]
enum NameMatcher {
    Exact(String),
    Pattern(Regex),
    /// A regex that failed to compile. Matches nothing.
    Invalid { pattern: String, error: regex::Error },
    /// An unrecognized match type. Matches nothing.
    Never,
}

impl NameMatcher {
    fn compile(rule: &AggregationRule) -> NameMatcher {
        match rule.match_type {
            MatchType::Strict => NameMatcher::Exact(rule.metric_pattern.clone()),
            MatchType::Regex => match Regex::new(&rule.metric_pattern) {
                Ok(regex) => NameMatcher::Pattern(regex),
                Err(error) => NameMatcher::Invalid {
                    pattern: rule.metric_pattern.clone(),
                    error,
                },
            },
            MatchType::Unrecognized => {
                tracing::warn!(
                    pattern = %rule.metric_pattern,
                    "unrecognized match type, rule will match nothing"
                );
                NameMatcher::Never
            }
        }
    }

    /// Fails for a pattern that could not be compiled.
    fn check(&self) -> Result<(), Error> {
        match self {
            NameMatcher::Invalid { pattern, error } => Err(Error::InvalidPattern {
                pattern: pattern.clone(),
                source: error.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Exact(expected) => expected == name,
            NameMatcher::Pattern(regex) => regex.is_match(name),
            NameMatcher::Invalid { .. } | NameMatcher::Never => false,
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    rule: AggregationRule,
    matcher: NameMatcher,
    output_name: String,
}

/// One data point of a matched metric, with the attributes of the resource owning it.
struct PointRecord<'a> {
    resource_attributes: &'a [KeyValue],
    point: SourcePoint<'a>,
}

/// The records sharing a group key.
struct Group<'a> {
    key: GroupKey,
    records: Vec<PointRecord<'a>>,
}

/// Aggregates metrics across resources according to a set of rules.
///
/// Holds only immutable configuration; [`MetricsAggregator::process`] may be called from
/// many threads at once.
#[derive(Debug)]
pub struct MetricsAggregator {
    group_by_labels: Vec<String>,
    markers: Vec<(String, String)>,
    rules: Vec<CompiledRule>,
}

impl MetricsAggregator {
    /// Builds an engine without validating the configuration.
    ///
    /// Invalid rules still have a defined behaviour: they match nothing, or fall back to
    /// default aggregation and output.
    pub fn new(config: &AggregatorConfig) -> MetricsAggregator {
        let rules = config
            .aggregation_rules
            .iter()
            .map(|rule| CompiledRule {
                matcher: NameMatcher::compile(rule),
                output_name: sanitize_metric_name(&rule.output_metric_name),
                rule: rule.clone(),
            })
            .collect();
        MetricsAggregator {
            group_by_labels: config.group_by_labels.clone(),
            markers: config
                .output_resource_attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            rules,
        }
    }

    /// Validates the configuration, then builds the engine.
    pub fn try_new(config: &AggregatorConfig) -> Result<MetricsAggregator, Error> {
        config.validate()?;
        Ok(MetricsAggregator::new(config))
    }

    /// Applies every rule to an export request.
    pub fn process(&self, mut request: ExportMetricsServiceRequest) -> ExportMetricsServiceRequest {
        self.process_resource_metrics(&mut request.resource_metrics);
        request
    }

    /// Applies every rule, in order, to a batch of resource metrics.
    ///
    /// A failing rule is logged and skipped; the batch itself never fails.
    pub fn process_resource_metrics(&self, batch: &mut Vec<ResourceMetrics>) {
        for (index, rule) in self.rules.iter().enumerate() {
            match self.apply_rule(rule, batch) {
                Ok(groups) => tracing::debug!(
                    rule = index,
                    output = %rule.output_name,
                    groups,
                    "applied aggregation rule"
                ),
                Err(e) => tracing::error!(
                    rule = index,
                    pattern = %rule.rule.metric_pattern,
                    error = %e,
                    "failed to apply aggregation rule"
                ),
            }
        }
    }

    /// Applies one rule, returning the number of synthesized groups.
    fn apply_rule(&self, rule: &CompiledRule, batch: &mut Vec<ResourceMetrics>) -> Result<usize, Error> {
        rule.matcher.check()?;

        let outputs = {
            let groups = self.group_matches(rule, batch);
            if groups.is_empty() {
                return Ok(0);
            }
            let now = aggregation::now_unix_nano();
            groups
                .into_values()
                .map(|group| self.synthesize(rule, group, now))
                .collect::<Vec<_>>()
        };
        let created = outputs.len();
        batch.extend(outputs);

        if !rule.rule.preserve_original_metrics {
            self.remove_originals(&rule.matcher, batch);
        }
        Ok(created)
    }

    /// Explodes every matching metric into per-point records and groups them.
    ///
    /// Groups are ordered by key so output order is stable.
    fn group_matches<'a>(
        &self,
        rule: &CompiledRule,
        batch: &'a [ResourceMetrics],
    ) -> BTreeMap<String, Group<'a>> {
        let mut groups: BTreeMap<String, Group<'a>> = BTreeMap::new();
        for resource_metrics in batch {
            let resource_attributes = resource_attributes(resource_metrics);
            for scope_metrics in &resource_metrics.scope_metrics {
                for metric in &scope_metrics.metrics {
                    if !rule.matcher.matches(&metric.name) {
                        continue;
                    }
                    for point in SourcePoint::from_metric(metric) {
                        let key = GroupKey::new(
                            resource_attributes,
                            point.attributes(),
                            &self.group_by_labels,
                        );
                        groups
                            .entry(key.as_str().to_owned())
                            .or_insert_with(|| Group {
                                key,
                                records: Vec::new(),
                            })
                            .records
                            .push(PointRecord {
                                resource_attributes,
                                point,
                            });
                    }
                }
            }
        }
        groups
    }

    fn synthesize(&self, rule: &CompiledRule, group: Group<'_>, now_unix_nano: u64) -> ResourceMetrics {
        let first_resource = group
            .records
            .first()
            .map(|r| r.resource_attributes)
            .unwrap_or_default();
        let labels = group.key.split_labels(first_resource);

        let mut attributes = labels.resource;
        for (key, value) in &self.markers {
            put_string(&mut attributes, key, value);
        }

        let values: Vec<f64> = group.records.iter().filter_map(|r| r.point.value()).collect();
        let points = group.records.iter().map(|r| &r.point);
        let output = OutputPoint {
            attributes: labels.point,
            value: aggregation::aggregate(&values, rule.rule.aggregation_type),
            count: group.records.len() as u64,
            start_time_unix_nano: aggregation::earliest_start_timestamp(points.clone(), now_unix_nano),
            time_unix_nano: aggregation::latest_timestamp(points, now_unix_nano),
        };

        ResourceMetrics {
            resource: Some(Resource {
                attributes,
                ..Default::default()
            }),
            scope_metrics: vec![ScopeMetrics {
                scope: Some(InstrumentationScope {
                    name: SCOPE_NAME.to_owned(),
                    version: SCOPE_VERSION.to_owned(),
                    ..Default::default()
                }),
                metrics: vec![Metric {
                    name: rule.output_name.clone(),
                    description: format!(
                        "Aggregated metric using {} aggregation",
                        rule.rule.aggregation_type
                    ),
                    data: Some(aggregation::synthesize(rule.rule.output_metric_type, output)),
                    ..Default::default()
                }],
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }
    }

    /// Drops matched metrics from every resource that is not synthesized.
    fn remove_originals(&self, matcher: &NameMatcher, batch: &mut [ResourceMetrics]) {
        for resource_metrics in batch.iter_mut() {
            if self.is_synthesized(resource_metrics) {
                continue;
            }
            for scope_metrics in resource_metrics.scope_metrics.iter_mut() {
                scope_metrics.metrics.retain(|m| !matcher.matches(&m.name));
            }
        }
    }

    /// A resource is synthesized when it carries every marker attribute.
    ///
    /// Without markers every resource counts as synthesized, so nothing is removed.
    fn is_synthesized(&self, resource_metrics: &ResourceMetrics) -> bool {
        let attributes = resource_attributes(resource_metrics);
        self.markers
            .iter()
            .all(|(key, value)| get_string(attributes, key).as_deref() == Some(value.as_str()))
    }
}

/// Makes a name a valid exposition metric name, `[A-Za-z_:][A-Za-z0-9_:]*`.
///
/// Invalid characters become `_`; a name starting with a digit is prefixed with `_`.
pub fn sanitize_metric_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}
