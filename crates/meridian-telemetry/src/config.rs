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

//! JSON configuration of the cluster metrics service.

use crate::aggregators::{RatioAggregator, SumAggregator};
use anyhow::Context;
use meridian_core::telemetry::{
    InstanceType, MetricsAggregator, MetricsError, MetricsFilter, MetricsResult,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// The reduction an [`AggregatorConfig`] builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorKind {
    /// Sum over exactly one filter.
    Sum,
    /// First filter's sum divided by the second's.
    Ratio,
}

/// Configuration for a single aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Registry key; the gauge is exported as `Cluster.<name>`
    pub name: String,
    /// Reduction to apply
    pub kind: AggregatorKind,
    /// Filters consumed, in the order the kind expects
    pub filters: Vec<MetricsFilter>,
}

impl AggregatorConfig {
    /// A summing aggregator over one worker metric of the same name.
    pub fn worker_sum(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            filters: vec![MetricsFilter::new(InstanceType::Worker, name.clone())],
            name,
            kind: AggregatorKind::Sum,
        }
    }

    /// Builds the aggregator, checking the filter count against the kind.
    pub fn build(&self) -> MetricsResult<Arc<dyn MetricsAggregator>> {
        if self.name.is_empty() {
            return Err(MetricsError::InvalidConfig(
                "aggregator name must not be empty".to_string(),
            ));
        }
        match (self.kind, self.filters.as_slice()) {
            (AggregatorKind::Sum, [filter]) => {
                Ok(Arc::new(SumAggregator::new(&self.name, filter.clone())))
            }
            (AggregatorKind::Ratio, [numerator, denominator]) => Ok(Arc::new(
                RatioAggregator::new(&self.name, numerator.clone(), denominator.clone()),
            )),
            (kind, filters) => Err(MetricsError::InvalidConfig(format!(
                "aggregator {} of kind {kind:?} cannot take {} filters",
                self.name,
                filters.len()
            ))),
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Minimum time between two gauge polls driven by `tick`
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Aggregators registered at startup; the cluster defaults when omitted
    #[serde(default = "ServiceConfig::default_cluster_aggregators")]
    pub aggregators: Vec<AggregatorConfig>,
}

impl ServiceConfig {
    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading metrics config {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("parsing metrics config {}", path.display()))
    }

    /// Save configuration to JSON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing metrics config {}", path.display()))?;
        Ok(())
    }

    /// The built-in cluster aggregators: bytes read summed over every worker.
    pub fn default_cluster_aggregators() -> Vec<AggregatorConfig> {
        vec![AggregatorConfig::worker_sum("BytesReadAlluxio")]
    }

    /// The poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Builds every configured aggregator. Names must be unique.
    pub fn build_aggregators(&self) -> MetricsResult<Vec<Arc<dyn MetricsAggregator>>> {
        let mut seen = HashSet::new();
        self.aggregators
            .iter()
            .map(|config| {
                if !seen.insert(config.name.as_str()) {
                    return Err(MetricsError::InvalidConfig(format!(
                        "duplicate aggregator {}",
                        config.name
                    )));
                }
                config.build()
            })
            .collect()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            aggregators: Self::default_cluster_aggregators(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_json() {
        let config = ServiceConfig::from_json("{}").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(
            config.aggregators,
            vec![AggregatorConfig {
                name: "BytesReadAlluxio".to_string(),
                kind: AggregatorKind::Sum,
                filters: vec![MetricsFilter::new(InstanceType::Worker, "BytesReadAlluxio")],
            }]
        );
    }

    #[test]
    fn test_explicit_empty_aggregator_list() {
        let config = ServiceConfig::from_json(r#"{ "aggregators": [] }"#).unwrap();
        assert!(config.aggregators.is_empty());
    }

    #[test]
    fn test_parse_aggregators() {
        let json = r#"{
            "poll_interval_ms": 500,
            "aggregators": [
                {
                    "name": "BytesRead",
                    "kind": "sum",
                    "filters": [{ "instance_type": "Worker", "name": "BytesRead" }]
                },
                {
                    "name": "CacheHitRatio",
                    "kind": "ratio",
                    "filters": [
                        { "instance_type": "Worker", "name": "CacheHits" },
                        { "instance_type": "Worker", "name": "CacheLookups" }
                    ]
                }
            ]
        }"#;
        let config = ServiceConfig::from_json(json).unwrap();
        assert_eq!(config.poll_interval_ms, 500);

        let aggregators = config.build_aggregators().unwrap();
        let names: Vec<&str> = aggregators.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["BytesRead", "CacheHitRatio"]);
        assert_eq!(aggregators[1].filters().len(), 2);
    }

    #[test]
    fn test_filter_count_is_validated() {
        let config = AggregatorConfig {
            name: "Broken".to_string(),
            kind: AggregatorKind::Ratio,
            filters: vec![MetricsFilter::new(InstanceType::Worker, "A")],
        };
        assert!(matches!(config.build(), Err(MetricsError::InvalidConfig(_))));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let config = ServiceConfig {
            poll_interval_ms: 1,
            aggregators: vec![
                AggregatorConfig::worker_sum("BytesRead"),
                AggregatorConfig::worker_sum("BytesRead"),
            ],
        };
        assert!(matches!(
            config.build_aggregators(),
            Err(MetricsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let config = ServiceConfig::default();
        config.to_file(&path).unwrap();
        assert_eq!(ServiceConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ServiceConfig::from_file("/nonexistent/metrics.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/metrics.json"));
    }
}
