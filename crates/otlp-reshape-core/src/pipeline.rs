//! Wiring of the rule engine in front of a terminal consumer.

use opentelemetry_proto::tonic::{
    collector::metrics::v1::ExportMetricsServiceRequest, metrics::v1::ResourceMetrics,
};

use crate::{accumulator::MetricAccumulator, processor::MetricsAggregator};

/// A pipeline stage receiving decoded metric batches.
pub trait MetricsConsumer: Send + Sync {
    /// Consumes a batch, returning the number of data points it kept.
    fn consume(&self, batch: Vec<ResourceMetrics>) -> usize;
}

impl MetricsConsumer for MetricAccumulator {
    fn consume(&self, batch: Vec<ResourceMetrics>) -> usize {
        batch.iter().map(|rm| self.accumulate(rm)).sum()
    }
}

/// Runs every batch through a [`MetricsAggregator`] before handing it to the next stage.
pub struct AggregatingConsumer<C> {
    aggregator: MetricsAggregator,
    next: C,
}

/// The standard pipeline: rule engine, then accumulator.
pub type MetricsPipeline = AggregatingConsumer<MetricAccumulator>;

impl<C: MetricsConsumer> AggregatingConsumer<C> {
    pub fn new(aggregator: MetricsAggregator, next: C) -> AggregatingConsumer<C> {
        AggregatingConsumer { aggregator, next }
    }

    /// The next stage.
    pub fn downstream(&self) -> &C {
        &self.next
    }

    /// Consumes a decoded export request.
    pub fn consume_request(&self, request: ExportMetricsServiceRequest) -> usize {
        self.consume(request.resource_metrics)
    }
}

impl<C: MetricsConsumer> MetricsConsumer for AggregatingConsumer<C> {
    fn consume(&self, mut batch: Vec<ResourceMetrics>) -> usize {
        self.aggregator.process_resource_metrics(&mut batch);
        self.next.consume(batch)
    }
}
