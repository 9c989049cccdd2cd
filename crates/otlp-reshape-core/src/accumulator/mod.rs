//! Last-value cache of metric series.
//!
//! Every data point ingested is stored as a single-point copy of its metric, keyed by
//! [`TimeSeriesIdentity`]. Entries are overwritten by newer observations of the same series
//! and disappear after the configured expiration unless refreshed, or when removed by one of
//! the cleanup operations.
//!
//! The cache is a concurrent map with per-key locking: ingest, snapshot and cleanup may run
//! from any number of threads at once. Deletions snapshot the keys first and then remove
//! each key only if its current value still matches, so a concurrent refresh or removal of
//! the same key is tolerated.

mod timeseries_id;

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use opentelemetry_proto::tonic::{
    common::v1::{InstrumentationScope, KeyValue},
    metrics::v1::{
        metric::Data, ExponentialHistogram, Gauge, Histogram, Metric, ResourceMetrics, Sum,
        Summary,
    },
};
use regex::Regex;

use crate::{
    attributes::{get_string, resource_attributes, value_as_string},
    config::AccumulatorConfig,
};

pub use timeseries_id::{MetricShape, TimeSeriesIdentity};

const SERVICE_NAME: &str = "service.name";
const SERVICE_NAMESPACE: &str = "service.namespace";
const SERVICE_INSTANCE_ID: &str = "service.instance.id";
const JOB_LABEL: &str = "job";
const INSTANCE_LABEL: &str = "instance";

/// The most recent observation of one series.
#[derive(Debug, Clone)]
struct AccumulatedValue {
    /// A copy of the metric holding only the observed data point.
    metric: Metric,
    resource_attributes: Vec<KeyValue>,
    scope: Option<InstrumentationScope>,
    schema_url: String,
    /// Labels matched by [`MetricAccumulator::clean_by_labels`]: resource attributes, the
    /// derived `job` and `instance` labels, then point attributes, which win.
    labels: BTreeMap<String, String>,
    inserted_at: Instant,
}

impl AccumulatedValue {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= ttl
    }
}

/// One live series returned by [`MetricAccumulator::collect`].
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedSeries {
    pub metric: Metric,
    pub resource_attributes: Vec<KeyValue>,
    pub scope: Option<InstrumentationScope>,
    pub schema_url: String,
}

/// Concurrent last-value store for metric series, with expiry.
pub struct MetricAccumulator {
    entries: scc::HashMap<TimeSeriesIdentity, AccumulatedValue>,
    ttl: Duration,
}

impl MetricAccumulator {
    /// Creates an accumulator whose series expire after `ttl` without refresh.
    pub fn new(ttl: Duration) -> MetricAccumulator {
        MetricAccumulator {
            entries: scc::HashMap::new(),
            ttl,
        }
    }

    pub fn from_config(config: &AccumulatorConfig) -> MetricAccumulator {
        MetricAccumulator::new(config.metric_expiration)
    }

    /// Number of cached series, including any not yet evicted after expiry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of series a snapshot taken now would return.
    pub fn live_count(&self) -> usize {
        self.live_count_at(Instant::now())
    }

    pub fn live_count_at(&self, now: Instant) -> usize {
        let mut live = 0;
        self.entries.iter_sync(|_, value| {
            if !value.is_expired(self.ttl, now) {
                live += 1;
            }
            true
        });
        live
    }

    /// Stores every data point of a resource, returning the number of points stored.
    pub fn accumulate(&self, resource_metrics: &ResourceMetrics) -> usize {
        self.accumulate_at(resource_metrics, Instant::now())
    }

    /// Stores every data point of a resource as observed at `now`.
    pub fn accumulate_at(&self, resource_metrics: &ResourceMetrics, now: Instant) -> usize {
        let resource = resource_attributes(resource_metrics);
        let mut stored = 0;
        for scope_metrics in &resource_metrics.scope_metrics {
            for metric in &scope_metrics.metrics {
                for (shape, single) in single_point_metrics(metric) {
                    let point = point_attributes(&single);
                    let identity = TimeSeriesIdentity::new(
                        &metric.name,
                        shape,
                        scope_metrics.scope.as_ref(),
                        resource,
                        point,
                    );
                    let value = AccumulatedValue {
                        labels: filter_labels(resource, point),
                        metric: single,
                        resource_attributes: resource.to_vec(),
                        scope: scope_metrics.scope.clone(),
                        schema_url: scope_metrics.schema_url.clone(),
                        inserted_at: now,
                    };
                    let _ = self.entries.upsert_sync(identity, value);
                    stored += 1;
                }
            }
        }
        tracing::debug!(stored, "accumulated resource metrics");
        stored
    }

    /// Snapshot of every live series, ordered by metric name.
    ///
    /// Expired series encountered are evicted.
    pub fn collect(&self) -> Vec<CollectedSeries> {
        self.collect_at(Instant::now())
    }

    pub fn collect_at(&self, now: Instant) -> Vec<CollectedSeries> {
        let mut live = Vec::with_capacity(self.entries.len());
        let mut expired = Vec::new();
        self.entries.iter_sync(|identity, value| {
            if value.is_expired(self.ttl, now) {
                expired.push(identity.clone());
            } else {
                live.push((
                    identity.clone(),
                    CollectedSeries {
                        metric: value.metric.clone(),
                        resource_attributes: value.resource_attributes.clone(),
                        scope: value.scope.clone(),
                        schema_url: value.schema_url.clone(),
                    },
                ));
            }
            true
        });
        for identity in expired {
            let _ = self
                .entries
                .remove_if_sync(&identity, |value| value.is_expired(self.ttl, now));
        }
        live.sort_by(|l, r| l.0.cmp(&r.0));
        live.into_iter().map(|(_, series)| series).collect()
    }

    /// Removes every series whose labels match all `filters`, returning the number removed.
    ///
    /// An empty filter set matches every series.
    pub fn clean_by_labels(&self, filters: &BTreeMap<String, String>) -> usize {
        let deleted = self.remove_matching(|_, value| {
            filters
                .iter()
                .all(|(key, expected)| value.labels.get(key) == Some(expected))
        });
        tracing::info!(?filters, deleted_count = deleted, "cleaned metrics by labels");
        deleted
    }

    /// Removes every series whose name contains `pattern` or matches it as a regex.
    ///
    /// A pattern that is not a valid regex removes nothing.
    pub fn clean_by_metric_name(&self, pattern: &str) -> usize {
        let regex = match Regex::new(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                tracing::error!(pattern, error = %e, "invalid metric name pattern");
                return 0;
            }
        };
        let deleted = self.remove_matching(|identity, _| {
            identity.name().contains(pattern) || regex.is_match(identity.name())
        });
        tracing::info!(pattern, deleted_count = deleted, "cleaned metrics by name");
        deleted
    }

    /// Removes every series not refreshed within the expiration.
    pub fn clean_expired(&self) -> usize {
        self.clean_expired_at(Instant::now())
    }

    pub fn clean_expired_at(&self, now: Instant) -> usize {
        let deleted = self.remove_matching(|_, value| value.is_expired(self.ttl, now));
        tracing::info!(deleted_count = deleted, "cleaned expired metrics");
        deleted
    }

    /// Removes the entries matching `predicate`, re-checking each against its current value.
    fn remove_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&TimeSeriesIdentity, &AccumulatedValue) -> bool,
    {
        let mut candidates = Vec::new();
        self.entries.iter_sync(|identity, value| {
            if predicate(identity, value) {
                candidates.push(identity.clone());
            }
            true
        });
        candidates
            .into_iter()
            .filter(|identity| {
                self.entries
                    .remove_if_sync(identity, |value| predicate(identity, value))
                    .is_some()
            })
            .count()
    }
}

/// Splits a metric into single-point copies, one per data point.
fn single_point_metrics(metric: &Metric) -> Vec<(MetricShape, Metric)> {
    let with_data = |data: Data| {
        (
            MetricShape::of(&data),
            Metric {
                name: metric.name.clone(),
                description: metric.description.clone(),
                unit: metric.unit.clone(),
                metadata: metric.metadata.clone(),
                data: Some(data),
            },
        )
    };
    match &metric.data {
        Some(Data::Gauge(gauge)) => gauge
            .data_points
            .iter()
            .map(|p| {
                with_data(Data::Gauge(Gauge {
                    data_points: vec![p.clone()],
                }))
            })
            .collect(),
        Some(Data::Sum(sum)) => sum
            .data_points
            .iter()
            .map(|p| {
                with_data(Data::Sum(Sum {
                    data_points: vec![p.clone()],
                    aggregation_temporality: sum.aggregation_temporality,
                    is_monotonic: sum.is_monotonic,
                }))
            })
            .collect(),
        Some(Data::Histogram(histogram)) => histogram
            .data_points
            .iter()
            .map(|p| {
                with_data(Data::Histogram(Histogram {
                    data_points: vec![p.clone()],
                    aggregation_temporality: histogram.aggregation_temporality,
                }))
            })
            .collect(),
        Some(Data::ExponentialHistogram(histogram)) => histogram
            .data_points
            .iter()
            .map(|p| {
                with_data(Data::ExponentialHistogram(ExponentialHistogram {
                    data_points: vec![p.clone()],
                    aggregation_temporality: histogram.aggregation_temporality,
                }))
            })
            .collect(),
        Some(Data::Summary(summary)) => summary
            .data_points
            .iter()
            .map(|p| {
                with_data(Data::Summary(Summary {
                    data_points: vec![p.clone()],
                }))
            })
            .collect(),
        None => Vec::new(),
    }
}

/// Attributes of the first data point of a metric.
fn point_attributes(metric: &Metric) -> &[KeyValue] {
    match &metric.data {
        Some(Data::Gauge(g)) => g.data_points.first().map(|p| p.attributes.as_slice()),
        Some(Data::Sum(s)) => s.data_points.first().map(|p| p.attributes.as_slice()),
        Some(Data::Histogram(h)) => h.data_points.first().map(|p| p.attributes.as_slice()),
        Some(Data::ExponentialHistogram(h)) => {
            h.data_points.first().map(|p| p.attributes.as_slice())
        }
        Some(Data::Summary(s)) => s.data_points.first().map(|p| p.attributes.as_slice()),
        None => None,
    }
    .unwrap_or_default()
}

/// Builds the label view used for filtering. Scope attributes are not included.
fn filter_labels(resource: &[KeyValue], point: &[KeyValue]) -> BTreeMap<String, String> {
    let mut labels: BTreeMap<String, String> = resource
        .iter()
        .map(|kv| (kv.key.clone(), value_as_string(kv.value.as_ref())))
        .collect();
    if let Some(service) = get_string(resource, SERVICE_NAME) {
        let job = match get_string(resource, SERVICE_NAMESPACE) {
            Some(namespace) if !namespace.is_empty() => format!("{namespace}/{service}"),
            _ => service,
        };
        labels.entry(JOB_LABEL.to_owned()).or_insert(job);
    }
    if let Some(instance) = get_string(resource, SERVICE_INSTANCE_ID) {
        labels.entry(INSTANCE_LABEL.to_owned()).or_insert(instance);
    }
    for kv in point {
        labels.insert(kv.key.clone(), value_as_string(kv.value.as_ref()));
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::string_kv;
    use opentelemetry_proto::tonic::{
        metrics::v1::{
            number_data_point, ExponentialHistogramDataPoint, NumberDataPoint, ScopeMetrics,
            SummaryDataPoint,
        },
        resource::v1::Resource,
    };
    use pretty_assertions::assert_eq;

    const TTL: Duration = Duration::from_secs(60);

    fn gauge(name: &str, value: f64, attributes: Vec<KeyValue>) -> Metric {
        Metric {
            name: name.to_owned(),
            data: Some(Data::Gauge(Gauge {
                data_points: vec![NumberDataPoint {
                    attributes,
                    time_unix_nano: 1_000,
                    value: Some(number_data_point::Value::AsDouble(value)),
                    ..Default::default()
                }],
            })),
            ..Default::default()
        }
    }

    fn resource(attributes: Vec<KeyValue>, metrics: Vec<Metric>) -> ResourceMetrics {
        ResourceMetrics {
            resource: Some(Resource {
                attributes,
                ..Default::default()
            }),
            scope_metrics: vec![ScopeMetrics {
                scope: Some(InstrumentationScope {
                    name: "test-scope".to_owned(),
                    ..Default::default()
                }),
                metrics,
                schema_url: "https://opentelemetry.io/schemas/1.21.0".to_owned(),
            }],
            schema_url: String::new(),
        }
    }

    fn value_of(series: &CollectedSeries) -> f64 {
        match &series.metric.data {
            Some(Data::Gauge(g)) => match g.data_points[0].value {
                Some(number_data_point::Value::AsDouble(v)) => v,
                other => panic!("Expected double, got {other:?}"),
            },
            other => panic!("Expected gauge, got {other:?}"),
        }
    }

    fn filters(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_last_value_wins() {
        let accumulator = MetricAccumulator::new(TTL);
        let attrs = vec![string_kv("service.name", "api")];
        accumulator.accumulate(&resource(attrs.clone(), vec![gauge("cpu", 1., vec![])]));
        accumulator.accumulate(&resource(attrs, vec![gauge("cpu", 2., vec![])]));

        assert_eq!(accumulator.len(), 1);
        let collected = accumulator.collect();
        assert_eq!(collected.len(), 1);
        assert_eq!(value_of(&collected[0]), 2.);
    }

    #[test]
    fn test_distinct_identities() {
        let accumulator = MetricAccumulator::new(TTL);
        let stored = accumulator.accumulate(&resource(
            vec![string_kv("service.name", "api")],
            vec![
                gauge("cpu", 1., vec![string_kv("core", "0")]),
                gauge("cpu", 2., vec![string_kv("core", "1")]),
                gauge("memory", 3., vec![]),
            ],
        ));
        assert_eq!(stored, 3);
        accumulator.accumulate(&resource(
            vec![string_kv("service.name", "web")],
            vec![gauge("cpu", 4., vec![string_kv("core", "0")])],
        ));
        assert_eq!(accumulator.len(), 4);
    }

    #[test]
    fn test_each_point_cached_separately() {
        let accumulator = MetricAccumulator::new(TTL);
        let metric = Metric {
            name: "requests".to_owned(),
            unit: "1".to_owned(),
            data: Some(Data::Sum(Sum {
                data_points: vec![
                    NumberDataPoint {
                        attributes: vec![string_kv("method", "GET")],
                        value: Some(number_data_point::Value::AsInt(3)),
                        ..Default::default()
                    },
                    NumberDataPoint {
                        attributes: vec![string_kv("method", "POST")],
                        value: Some(number_data_point::Value::AsInt(4)),
                        ..Default::default()
                    },
                ],
                aggregation_temporality: 2,
                is_monotonic: true,
            })),
            ..Default::default()
        };
        assert_eq!(accumulator.accumulate(&resource(vec![], vec![metric])), 2);

        for series in accumulator.collect() {
            assert_eq!(series.metric.unit, "1");
            match series.metric.data {
                Some(Data::Sum(sum)) => {
                    assert_eq!(sum.data_points.len(), 1);
                    assert!(sum.is_monotonic);
                    assert_eq!(sum.aggregation_temporality, 2);
                }
                other => panic!("Expected sum, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_other_shapes_cached() {
        let accumulator = MetricAccumulator::new(TTL);
        let exponential = Metric {
            name: "latency".to_owned(),
            data: Some(Data::ExponentialHistogram(ExponentialHistogram {
                data_points: vec![ExponentialHistogramDataPoint::default()],
                aggregation_temporality: 2,
            })),
            ..Default::default()
        };
        let summary = Metric {
            name: "latency".to_owned(),
            data: Some(Data::Summary(Summary {
                data_points: vec![SummaryDataPoint::default()],
            })),
            ..Default::default()
        };
        let empty = Metric {
            name: "nothing".to_owned(),
            ..Default::default()
        };
        let stored =
            accumulator.accumulate(&resource(vec![], vec![exponential, summary, empty]));
        assert_eq!(stored, 2);
        assert_eq!(accumulator.len(), 2);
    }

    #[test]
    fn test_collect_carries_context_and_orders_by_name() {
        let accumulator = MetricAccumulator::new(TTL);
        let attrs = vec![string_kv("service.name", "api")];
        accumulator.accumulate(&resource(
            attrs.clone(),
            vec![gauge("zeta", 1., vec![]), gauge("alpha", 2., vec![])],
        ));
        let collected = accumulator.collect();
        let names: Vec<&str> = collected.iter().map(|s| s.metric.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(collected[0].resource_attributes, attrs);
        assert_eq!(collected[0].scope.as_ref().unwrap().name, "test-scope");
        assert_eq!(
            collected[0].schema_url,
            "https://opentelemetry.io/schemas/1.21.0"
        );
    }

    #[test]
    fn test_ttl_expiry() {
        let accumulator = MetricAccumulator::new(TTL);
        let start = Instant::now();
        accumulator.accumulate_at(&resource(vec![], vec![gauge("cpu", 1., vec![])]), start);

        assert_eq!(accumulator.collect_at(start + TTL / 2).len(), 1);
        assert_eq!(accumulator.clean_expired_at(start + TTL / 2), 0);

        let later = start + TTL + Duration::from_secs(1);
        // Stale until evicted, but never counted as live.
        assert_eq!(accumulator.len(), 1);
        assert_eq!(accumulator.live_count_at(start + TTL / 2), 1);
        assert_eq!(accumulator.live_count_at(later), 0);
        assert!(accumulator.collect_at(later).is_empty());
        // Collect already evicted the entry.
        assert_eq!(accumulator.len(), 0);
    }

    #[test]
    fn test_clean_expired_counts() {
        let accumulator = MetricAccumulator::new(TTL);
        let start = Instant::now();
        accumulator.accumulate_at(&resource(vec![], vec![gauge("old", 1., vec![])]), start);
        accumulator.accumulate_at(
            &resource(vec![], vec![gauge("fresh", 1., vec![])]),
            start + TTL,
        );
        assert_eq!(accumulator.clean_expired_at(start + TTL), 1);
        assert_eq!(accumulator.len(), 1);
        assert_eq!(accumulator.collect_at(start + TTL)[0].metric.name, "fresh");
    }

    #[test]
    fn test_refresh_extends_life() {
        let accumulator = MetricAccumulator::new(TTL);
        let start = Instant::now();
        let batch = resource(vec![], vec![gauge("cpu", 1., vec![])]);
        accumulator.accumulate_at(&batch, start);
        accumulator.accumulate_at(&batch, start + TTL / 2);
        assert_eq!(accumulator.clean_expired_at(start + TTL), 0);
        assert_eq!(accumulator.clean_expired_at(start + TTL + TTL / 2), 1);
    }

    #[test]
    fn test_clean_by_labels_precision() {
        let accumulator = MetricAccumulator::new(TTL);
        accumulator.accumulate(&resource(
            vec![string_kv("service.name", "X")],
            vec![gauge("cpu", 1., vec![]), gauge("memory", 1., vec![])],
        ));
        accumulator.accumulate(&resource(
            vec![string_kv("service.name", "Y")],
            vec![gauge("cpu", 1., vec![])],
        ));

        assert_eq!(accumulator.clean_by_labels(&filters(&[("job", "X")])), 2);
        assert_eq!(accumulator.len(), 1);
        assert_eq!(accumulator.collect()[0].resource_attributes[0], string_kv("service.name", "Y"));
    }

    #[test]
    fn test_clean_by_labels_requires_every_filter() {
        let accumulator = MetricAccumulator::new(TTL);
        accumulator.accumulate(&resource(
            vec![string_kv("service.name", "api"), string_kv("env", "prod")],
            vec![
                gauge("cpu", 1., vec![string_kv("core", "0")]),
                gauge("cpu", 1., vec![string_kv("core", "1")]),
            ],
        ));
        assert_eq!(
            accumulator.clean_by_labels(&filters(&[("env", "prod"), ("core", "1")])),
            1
        );
        assert_eq!(
            accumulator.clean_by_labels(&filters(&[("env", "staging"), ("core", "0")])),
            0
        );
        assert_eq!(accumulator.len(), 1);
    }

    #[test]
    fn test_clean_by_resource_attribute() {
        let accumulator = MetricAccumulator::new(TTL);
        accumulator.accumulate(&resource(
            vec![string_kv("service.name", "test-service")],
            vec![gauge("test_metric_1", 1., vec![]), gauge("test_metric_2", 2., vec![])],
        ));
        accumulator.accumulate(&resource(
            vec![string_kv("service.name", "other")],
            vec![gauge("test_metric_1", 1., vec![])],
        ));
        assert_eq!(
            accumulator.clean_by_labels(&filters(&[("service.name", "test-service")])),
            2
        );
        assert_eq!(accumulator.len(), 1);
    }

    #[test]
    fn test_clean_by_empty_filters_removes_all() {
        let accumulator = MetricAccumulator::new(TTL);
        accumulator.accumulate(&resource(vec![], vec![gauge("a", 1., vec![]), gauge("b", 1., vec![])]));
        assert_eq!(accumulator.clean_by_labels(&BTreeMap::new()), 2);
        assert!(accumulator.is_empty());
    }

    #[test]
    fn test_clean_by_metric_name_substring_and_regex() {
        let batch = resource(
            vec![],
            vec![
                gauge("test_metric_1", 1., vec![]),
                gauge("test_metric_2", 1., vec![]),
                gauge("other_metric", 1., vec![]),
            ],
        );

        let accumulator = MetricAccumulator::new(TTL);
        accumulator.accumulate(&batch);
        assert_eq!(accumulator.clean_by_metric_name("test_metric_"), 2);
        assert_eq!(accumulator.clean_by_metric_name("test_metric_"), 0);

        let accumulator = MetricAccumulator::new(TTL);
        accumulator.accumulate(&batch);
        assert_eq!(accumulator.clean_by_metric_name("test_metric_.*"), 2);
        assert_eq!(accumulator.clean_by_metric_name("^other_metric$"), 1);
        assert!(accumulator.is_empty());
    }

    #[test]
    fn test_clean_by_invalid_pattern() {
        let accumulator = MetricAccumulator::new(TTL);
        accumulator.accumulate(&resource(vec![], vec![gauge("cpu[", 1., vec![])]));
        assert_eq!(accumulator.clean_by_metric_name("cpu["), 0);
        assert_eq!(accumulator.len(), 1);
    }

    #[test]
    fn test_filter_labels() {
        let resource = vec![
            string_kv("service.name", "checkout"),
            string_kv("service.namespace", "shop"),
            string_kv("service.instance.id", "pod-1"),
            string_kv("env", "prod"),
        ];
        let point = vec![string_kv("env", "canary"), string_kv("method", "GET")];
        assert_eq!(
            filter_labels(&resource, &point),
            filters(&[
                ("env", "canary"),
                ("instance", "pod-1"),
                ("job", "shop/checkout"),
                ("method", "GET"),
                ("service.instance.id", "pod-1"),
                ("service.name", "checkout"),
                ("service.namespace", "shop"),
            ])
        );

        let labels = filter_labels(
            &[string_kv("service.name", "api"), string_kv("job", "explicit")],
            &[],
        );
        assert_eq!(labels.get("job").map(String::as_str), Some("explicit"));
        let labels = filter_labels(&[string_kv("service.name", "api")], &[]);
        assert_eq!(labels.get("job").map(String::as_str), Some("api"));
        assert_eq!(labels.get("instance"), None);
    }

    #[test]
    fn test_concurrent_ingest_collect_and_clean() {
        let accumulator = MetricAccumulator::new(TTL);
        std::thread::scope(|s| {
            for writer in 0..4 {
                let accumulator = &accumulator;
                s.spawn(move || {
                    for i in 0..200 {
                        let service = format!("svc-{writer}");
                        accumulator.accumulate(&resource(
                            vec![string_kv("service.name", service)],
                            vec![gauge("cpu", i as f64, vec![string_kv("slot", (i % 10).to_string())])],
                        ));
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..50 {
                    for series in accumulator.collect() {
                        assert_eq!(series.metric.name, "cpu");
                    }
                }
            });
            s.spawn(|| {
                for _ in 0..50 {
                    accumulator.clean_by_labels(&filters(&[("job", "svc-0")]));
                }
            });
        });
        // Each writer owns ten series; svc-0 may have been partially recreated after cleanup.
        let len = accumulator.len();
        assert!((30..=40).contains(&len), "unexpected series count {len}");
        for series in accumulator.collect() {
            let slot = match &series.metric.data {
                Some(Data::Gauge(g)) => get_string(&g.data_points[0].attributes, "slot"),
                other => panic!("Expected gauge, got {other:?}"),
            };
            let slot: f64 = slot.unwrap().parse().unwrap();
            if series.resource_attributes[0] != string_kv("service.name", "svc-0") {
                // Last write per slot was iteration 190 + slot.
                assert_eq!(value_of(&series), 190. + slot);
            }
        }
    }
}
