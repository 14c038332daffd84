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

//! Aggregators reducing filtered worker samples into cluster-wide values.

use meridian_core::telemetry::{sum_values, FilteredSamples, MetricsAggregator, MetricsFilter};
use std::fmt;
use std::sync::Arc;

/// Sums every sample matched by a single filter.
#[derive(Debug, Clone)]
pub struct SumAggregator {
    name: String,
    filters: [MetricsFilter; 1],
}

impl SumAggregator {
    /// Creates an aggregator named `name` summing the samples of `filter`.
    pub fn new(name: impl Into<String>, filter: MetricsFilter) -> Self {
        Self {
            name: name.into(),
            filters: [filter],
        }
    }
}

impl MetricsAggregator for SumAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn filters(&self) -> &[MetricsFilter] {
        &self.filters
    }

    fn value(&self, samples: &FilteredSamples) -> f64 {
        sum_values(samples, &self.filters[0])
    }
}

/// Divides the sum of one filter's samples by the sum of another's.
///
/// Evaluates to `0.0` while the denominator sums to zero.
#[derive(Debug, Clone)]
pub struct RatioAggregator {
    name: String,
    filters: [MetricsFilter; 2],
}

impl RatioAggregator {
    /// Creates a ratio of `numerator` over `denominator`.
    pub fn new(
        name: impl Into<String>,
        numerator: MetricsFilter,
        denominator: MetricsFilter,
    ) -> Self {
        Self {
            name: name.into(),
            filters: [numerator, denominator],
        }
    }
}

impl MetricsAggregator for RatioAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn filters(&self) -> &[MetricsFilter] {
        &self.filters
    }

    fn value(&self, samples: &FilteredSamples) -> f64 {
        let denominator = sum_values(samples, &self.filters[1]);
        if denominator == 0.0 {
            return 0.0;
        }
        sum_values(samples, &self.filters[0]) / denominator
    }
}

type Reduction = dyn Fn(&FilteredSamples) -> f64 + Send + Sync;

/// An aggregator backed by a closure.
#[derive(Clone)]
pub struct FnAggregator {
    name: String,
    filters: Vec<MetricsFilter>,
    reduce: Arc<Reduction>,
}

impl FnAggregator {
    /// Creates an aggregator applying `reduce` to the samples of `filters`.
    pub fn new<F>(name: impl Into<String>, filters: Vec<MetricsFilter>, reduce: F) -> Self
    where
        F: Fn(&FilteredSamples) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            filters,
            reduce: Arc::new(reduce),
        }
    }
}

impl fmt::Debug for FnAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAggregator")
            .field("name", &self.name)
            .field("filters", &self.filters)
            .finish_non_exhaustive()
    }
}

impl MetricsAggregator for FnAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn filters(&self) -> &[MetricsFilter] {
        &self.filters
    }

    fn value(&self, samples: &FilteredSamples) -> f64 {
        (self.reduce)(samples)
    }
}
