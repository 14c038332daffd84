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

//! Service exposing the cluster metrics of the master process.

use crate::config::ServiceConfig;
use crate::metrics::{ClusterMetrics, GaugeReading};
use crate::storage::MetricsStore;
use meridian_core::telemetry::{MetricsAggregator, MetricsResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The name the service registers under in its host process.
pub const METRICS_MASTER_NAME: &str = "MetricsMaster";

/// The gauge readings of one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    /// One reading per bound gauge, in name order.
    pub readings: Vec<GaugeReading>,
}

impl PollReport {
    /// The value of gauge `name`, or `None` if it failed or is not bound.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.readings
            .iter()
            .find(|reading| reading.name == name)
            .and_then(GaugeReading::value)
    }

    /// The readings that failed this poll.
    pub fn failures(&self) -> impl Iterator<Item = &GaugeReading> {
        self.readings.iter().filter(|reading| reading.result.is_err())
    }
}

/// Holds the metrics store fed by workers and clients and the cluster gauges
/// computed from it.
///
/// The service keeps no state across restarts. Polling happens on the
/// caller's thread: an external scheduler either calls [`poll`](Self::poll)
/// at its own cadence or calls [`tick`](Self::tick) often and lets the
/// configured interval gate the work.
#[derive(Debug)]
pub struct MetricsMasterService {
    metrics: ClusterMetrics,
    last_poll: Instant,
    poll_interval: Duration,
}

impl MetricsMasterService {
    /// Creates the service over a fresh store, registering the configured
    /// aggregators.
    pub fn new(config: &ServiceConfig) -> MetricsResult<Self> {
        Self::with_store(Arc::new(MetricsStore::new()), config)
    }

    /// Creates the service over an existing store.
    pub fn with_store(store: Arc<MetricsStore>, config: &ServiceConfig) -> MetricsResult<Self> {
        let metrics = ClusterMetrics::new(store);
        for aggregator in config.build_aggregators()? {
            metrics.register_shared(aggregator);
        }
        Ok(Self {
            metrics,
            last_poll: Instant::now(),
            poll_interval: config.poll_interval(),
        })
    }

    /// The service name.
    pub fn name(&self) -> &'static str {
        METRICS_MASTER_NAME
    }

    /// Registers an additional aggregator; see [`ClusterMetrics::register`].
    pub fn register(
        &self,
        aggregator: impl MetricsAggregator,
    ) -> Option<Arc<dyn MetricsAggregator>> {
        self.metrics.register(aggregator)
    }

    /// Evaluates every cluster gauge now.
    ///
    /// A gauge that fails is logged and reported as unavailable; the other
    /// gauges are still evaluated.
    pub fn poll(&self) -> PollReport {
        log::trace!("Polling cluster gauges...");
        let readings = self.metrics.read_gauges();
        for reading in &readings {
            if let Err(e) = &reading.result {
                log::warn!("[{}] Gauge {} unavailable: {}", METRICS_MASTER_NAME, reading.name, e);
            }
        }
        PollReport { readings }
    }

    /// Should be called periodically.
    /// Polls the gauges if the interval has passed.
    pub fn tick(&mut self) -> Option<PollReport> {
        if self.last_poll.elapsed() >= self.poll_interval {
            self.last_poll = Instant::now();
            Some(self.poll())
        } else {
            None
        }
    }

    /// Drops every stored sample.
    pub fn reset_state(&self) -> MetricsResult<()> {
        log::info!("Resetting {} state", METRICS_MASTER_NAME);
        self.metrics.store().clear()
    }

    /// The store the ingestion path writes into.
    pub fn store(&self) -> &Arc<MetricsStore> {
        self.metrics.store()
    }

    /// The aggregator and gauge registries.
    pub fn cluster_metrics(&self) -> &ClusterMetrics {
        &self.metrics
    }

    /// The interval gating [`tick`](Self::tick).
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
