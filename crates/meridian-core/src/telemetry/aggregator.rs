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

//! The contract between the metrics store and the computations that derive
//! cluster-wide values from it.

use super::metrics::{InstanceType, MetricSample, MetricsFilter};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// The samples matched by each of an aggregator's filters.
pub type FilteredSamples = HashMap<MetricsFilter, Vec<Arc<MetricSample>>>;

/// A named reduction over filtered sample sets.
///
/// An aggregator declares which filters it needs; on every evaluation the
/// caller queries the store once per filter and hands the results to
/// [`value`](MetricsAggregator::value). Implementations must be pure with
/// respect to the store: they only ever see the snapshot they are given.
pub trait MetricsAggregator: Send + Sync + Debug + 'static {
    /// The unique registry key, also used to derive the exported gauge name.
    fn name(&self) -> &str;

    /// The filters whose samples this aggregator consumes.
    fn filters(&self) -> &[MetricsFilter];

    /// Reduces the matched samples into one value.
    ///
    /// A filter with no matches may be absent from `samples` or map to an
    /// empty set; both must be treated the same.
    fn value(&self, samples: &FilteredSamples) -> f64;
}

/// Returns the exported gauge name for a cluster-wide aggregate.
pub fn cluster_metric_name(name: &str) -> String {
    format!("{}.{}", InstanceType::Cluster, name)
}

/// Sums the values matched by `filter`, treating a missing entry as empty.
pub fn sum_values(samples: &FilteredSamples, filter: &MetricsFilter) -> f64 {
    samples
        .get(filter)
        .map(|matched| matched.iter().map(|s| s.value()).sum())
        .unwrap_or(0.0)
}
