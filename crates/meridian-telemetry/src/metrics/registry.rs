// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Registry of named aggregators and the cluster gauges bound to them.

use crate::metrics::gauge::{Gauge, GaugeReading, GaugeRegistry};
use crate::storage::MetricsStore;
use meridian_core::telemetry::{
    cluster_metric_name, FilteredSamples, MetricsAggregator, MetricsError, MetricsResult,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A thread-safe map from aggregator name to aggregator.
#[derive(Debug, Clone, Default)]
pub struct AggregatorRegistry {
    aggregators: Arc<RwLock<HashMap<String, Arc<dyn MetricsAggregator>>>>,
}

impl AggregatorRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `aggregator` under its name, returning the aggregator it replaced.
    pub fn insert(
        &self,
        aggregator: Arc<dyn MetricsAggregator>,
    ) -> Option<Arc<dyn MetricsAggregator>> {
        self.aggregators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(aggregator.name().to_string(), aggregator)
    }

    /// Returns the aggregator registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn MetricsAggregator>> {
        self.aggregators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Returns every registered name, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .aggregators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// The number of registered aggregators.
    pub fn len(&self) -> usize {
        self.aggregators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no aggregator is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Queries the store once per filter of `aggregator` and reduces the result.
pub fn evaluate_aggregator(
    store: &MetricsStore,
    aggregator: &dyn MetricsAggregator,
) -> MetricsResult<f64> {
    let mut samples = FilteredSamples::with_capacity(aggregator.filters().len());
    for filter in aggregator.filters() {
        let matched =
            store.get_metrics_by_instance_type_and_name(filter.instance_type, &filter.name)?;
        samples.insert(filter.clone(), matched);
    }
    Ok(aggregator.value(&samples))
}

/// Binds aggregators to cluster gauges evaluated against a shared store.
///
/// Each gauge looks its aggregator up by name on every read, so registering
/// a new aggregator under an existing name changes what the already bound
/// gauge computes.
#[derive(Debug, Clone)]
pub struct ClusterMetrics {
    store: Arc<MetricsStore>,
    aggregators: AggregatorRegistry,
    gauges: GaugeRegistry,
}

impl ClusterMetrics {
    /// Creates a binder over `store` with its own gauge registry.
    pub fn new(store: Arc<MetricsStore>) -> Self {
        Self::with_gauge_registry(store, GaugeRegistry::new())
    }

    /// Creates a binder exporting its gauges into an existing registry.
    pub fn with_gauge_registry(store: Arc<MetricsStore>, gauges: GaugeRegistry) -> Self {
        Self {
            store,
            aggregators: AggregatorRegistry::new(),
            gauges,
        }
    }

    /// Registers an aggregator and binds its cluster gauge.
    pub fn register(
        &self,
        aggregator: impl MetricsAggregator,
    ) -> Option<Arc<dyn MetricsAggregator>> {
        self.register_shared(Arc::new(aggregator))
    }

    /// Registers a shared aggregator, replacing any aggregator with the same
    /// name, and binds the gauge `Cluster.<name>` unless already bound.
    /// Returns the replaced aggregator.
    pub fn register_shared(
        &self,
        aggregator: Arc<dyn MetricsAggregator>,
    ) -> Option<Arc<dyn MetricsAggregator>> {
        let name = aggregator.name().to_string();
        let previous = self.aggregators.insert(aggregator);
        if previous.is_some() {
            log::info!("Replaced aggregator: {name}");
        } else {
            log::info!("Registered aggregator: {name}");
        }

        let store = Arc::clone(&self.store);
        let aggregators = self.aggregators.clone();
        let lookup = name.clone();
        self.gauges
            .register_if_absent(Gauge::new(cluster_metric_name(&name), move || {
                let aggregator = aggregators
                    .get(&lookup)
                    .ok_or_else(|| MetricsError::AggregatorNotFound(lookup.clone()))?;
                evaluate_aggregator(&store, aggregator.as_ref())
            }));
        previous
    }

    /// Evaluates the aggregator registered under `name`.
    pub fn evaluate(&self, name: &str) -> MetricsResult<f64> {
        let aggregator = self
            .aggregators
            .get(name)
            .ok_or_else(|| MetricsError::AggregatorNotFound(name.to_string()))?;
        evaluate_aggregator(&self.store, aggregator.as_ref())
    }

    /// Reads every bound gauge; see [`GaugeRegistry::read_all`].
    pub fn read_gauges(&self) -> Vec<GaugeReading> {
        self.gauges.read_all()
    }

    /// The aggregator registry.
    pub fn aggregators(&self) -> &AggregatorRegistry {
        &self.aggregators
    }

    /// The gauge registry the aggregators are exported into.
    pub fn gauges(&self) -> &GaugeRegistry {
        &self.gauges
    }

    /// The store the gauges read from.
    pub fn store(&self) -> &Arc<MetricsStore> {
        &self.store
    }
}
