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

//! # Meridian Telemetry
//!
//! The indexed store of samples reported by workers and clients, and the
//! aggregators and gauges that turn those samples into cluster metrics.

#![warn(missing_docs)]

pub mod aggregators;
pub mod config;
pub mod metrics;
pub mod service;
pub mod storage;

pub use config::{AggregatorConfig, AggregatorKind, ServiceConfig};
pub use metrics::{ClusterMetrics, Gauge, GaugeReading, GaugeRegistry};
pub use service::{MetricsMasterService, PollReport, METRICS_MASTER_NAME};
pub use storage::{MetricsStore, StoreStats};
