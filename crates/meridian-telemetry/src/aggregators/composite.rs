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

//! Aggregators built out of other aggregators.

use meridian_core::telemetry::{FilteredSamples, MetricsAggregator, MetricsFilter};
use std::sync::Arc;

/// How a [`CompositeAggregator`] combines the values of its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    /// Sum of the parts.
    Sum,
    /// Largest part.
    Max,
    /// Smallest part.
    Min,
    /// Arithmetic mean of the parts.
    Mean,
}

/// Combines the values of several aggregators into one.
///
/// The composite declares the union of its parts' filters, so one round of
/// store queries serves every part.
#[derive(Debug, Clone)]
pub struct CompositeAggregator {
    name: String,
    combine: Combine,
    parts: Vec<Arc<dyn MetricsAggregator>>,
    filters: Vec<MetricsFilter>,
}

impl CompositeAggregator {
    /// Creates a composite over `parts`.
    pub fn new(
        name: impl Into<String>,
        combine: Combine,
        parts: Vec<Arc<dyn MetricsAggregator>>,
    ) -> Self {
        let mut filters: Vec<MetricsFilter> = Vec::new();
        for filter in parts.iter().flat_map(|part| part.filters()) {
            if !filters.contains(filter) {
                filters.push(filter.clone());
            }
        }
        Self {
            name: name.into(),
            combine,
            parts,
            filters,
        }
    }
}

impl MetricsAggregator for CompositeAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn filters(&self) -> &[MetricsFilter] {
        &self.filters
    }

    fn value(&self, samples: &FilteredSamples) -> f64 {
        let values = self.parts.iter().map(|part| part.value(samples));
        match self.combine {
            Combine::Sum => values.sum(),
            Combine::Max => values.reduce(f64::max).unwrap_or(0.0),
            Combine::Min => values.reduce(f64::min).unwrap_or(0.0),
            Combine::Mean => {
                if self.parts.is_empty() {
                    return 0.0;
                }
                values.sum::<f64>() / self.parts.len() as f64
            }
        }
    }
}
