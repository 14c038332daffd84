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

//! Provides the foundational data structures for cluster telemetry.
//!
//! This module defines the "common language" spoken between reporting
//! instances, the metrics store and the aggregators. `meridian-telemetry`
//! provides the concrete store and the services built on top of it.

pub mod aggregator;
pub mod metrics;

pub use self::aggregator::{cluster_metric_name, sum_values, FilteredSamples, MetricsAggregator};
pub use self::metrics::{
    escape_hostname, instance_key_for, InstanceType, MetricSample, MetricsError, MetricsFilter,
    MetricsResult,
};
