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

//! Value types for reported metric samples and the errors of the metrics system.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Separates the components of a full metric name.
const SEPARATOR: char = '.';
/// Separates a hostname from an instance id inside a full metric name.
const ID_SEPARATOR: char = ':';

/// The kind of process that reported a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InstanceType {
    /// Values computed across the whole cluster.
    Cluster,
    /// The coordinating master process.
    Master,
    /// A worker process.
    Worker,
    /// A client process.
    Client,
}

impl InstanceType {
    /// The canonical string used in full metric names.
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Cluster => "Cluster",
            InstanceType::Master => "Master",
            InstanceType::Worker => "Worker",
            InstanceType::Client => "Client",
        }
    }
}

impl Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceType {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cluster" => Ok(InstanceType::Cluster),
            "master" => Ok(InstanceType::Master),
            "worker" => Ok(InstanceType::Worker),
            "client" => Ok(InstanceType::Client),
            _ => Err(MetricsError::InvalidMetricName(format!(
                "unknown instance type '{s}'"
            ))),
        }
    }
}

/// One point-in-time observation reported by an instance.
///
/// Samples are immutable: a newer report from the same instance supersedes
/// the old sample in the store rather than mutating it. The full name is
/// derived once at construction and is unique per reporting instance.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    instance_type: InstanceType,
    hostname: Option<String>,
    instance_id: Option<String>,
    name: String,
    value: f64,
    full_name: String,
}

impl MetricSample {
    /// Creates a sample with no instance id.
    pub fn new(
        instance_type: InstanceType,
        hostname: Option<String>,
        name: impl Into<String>,
        value: f64,
    ) -> Self {
        Self::with_instance_id(instance_type, hostname, None, name, value)
    }

    /// Creates a sample reported by a specific instance on a host.
    pub fn with_instance_id(
        instance_type: InstanceType,
        hostname: Option<String>,
        instance_id: Option<String>,
        name: impl Into<String>,
        value: f64,
    ) -> Self {
        let name = name.into();
        let full_name = build_full_name(
            instance_type,
            hostname.as_deref(),
            instance_id.as_deref(),
            &name,
        );
        Self {
            instance_type,
            hostname,
            instance_id,
            name,
            value,
            full_name,
        }
    }

    /// Shorthand for a worker sample reported by `hostname`.
    pub fn worker(hostname: impl Into<String>, name: impl Into<String>, value: f64) -> Self {
        Self::new(InstanceType::Worker, Some(hostname.into()), name, value)
    }

    /// Shorthand for a client sample reported by `client_id` on `hostname`.
    pub fn client(
        hostname: impl Into<String>,
        client_id: impl Into<String>,
        name: impl Into<String>,
        value: f64,
    ) -> Self {
        Self::with_instance_id(
            InstanceType::Client,
            Some(hostname.into()),
            Some(client_id.into()),
            name,
            value,
        )
    }

    /// Parses a full metric name such as `Worker.10_0_0_1.BytesRead` or
    /// `Client.host_a:c1.BytesRead` into a sample.
    ///
    /// The hostname is kept in its escaped form.
    pub fn from_full_name(full_name: &str, value: f64) -> MetricsResult<Self> {
        let invalid = || MetricsError::InvalidMetricName(full_name.to_string());

        let (type_part, rest) = full_name.split_once(SEPARATOR).ok_or_else(invalid)?;
        let instance_type = type_part.parse::<InstanceType>()?;

        let (source, name) = match rest.split_once(SEPARATOR) {
            Some((source, name)) => (Some(source), name),
            None => (None, rest),
        };
        if name.is_empty() {
            return Err(invalid());
        }

        let (hostname, instance_id) = match source {
            None => (None, None),
            Some(source) => match source.split_once(ID_SEPARATOR) {
                Some((host, id)) => (non_empty(host), non_empty(id)),
                None => (non_empty(source), None),
            },
        };
        if source.is_some() && hostname.is_none() && instance_id.is_none() {
            return Err(invalid());
        }

        Ok(Self::with_instance_id(
            instance_type,
            hostname,
            instance_id,
            name,
            value,
        ))
    }

    /// The type of instance that reported this sample.
    pub fn instance_type(&self) -> InstanceType {
        self.instance_type
    }

    /// The reporting hostname, if the producer knows it.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// The reporting instance id, if any.
    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    /// The short metric name, shared by every instance reporting it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The reported value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// The full name, unique per reporting instance.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The composite (hostname, instance id) key identifying the reporter.
    pub fn instance_key(&self) -> String {
        instance_key_for(self.hostname.as_deref(), self.instance_id.as_deref())
    }
}

impl Display for MetricSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.full_name, self.value)
    }
}

/// Builds the composite reporter key: the escaped hostname (or nothing)
/// followed by `:<id>` when an id is present.
///
/// The hostname is escaped so that a sample parsed back from its full name
/// and a sample built from the raw hostname share one key.
pub fn instance_key_for(hostname: Option<&str>, instance_id: Option<&str>) -> String {
    let mut key = hostname.map(escape_hostname).unwrap_or_default();
    if let Some(id) = instance_id {
        key.push(ID_SEPARATOR);
        key.push_str(id);
    }
    key
}

/// Replaces the name separator inside a hostname so it stays one component.
pub fn escape_hostname(hostname: &str) -> String {
    hostname.replace(SEPARATOR, "_")
}

fn build_full_name(
    instance_type: InstanceType,
    hostname: Option<&str>,
    instance_id: Option<&str>,
    name: &str,
) -> String {
    let mut full_name = String::from(instance_type.as_str());
    full_name.push(SEPARATOR);
    if hostname.is_some() || instance_id.is_some() {
        full_name.push_str(&instance_key_for(hostname, instance_id));
        full_name.push(SEPARATOR);
    }
    full_name.push_str(name);
    full_name
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Selects the samples of one short name reported by one instance type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricsFilter {
    /// The instance type to query.
    pub instance_type: InstanceType,
    /// The short metric name to match.
    pub name: String,
}

impl MetricsFilter {
    /// Creates a new filter.
    pub fn new(instance_type: InstanceType, name: impl Into<String>) -> Self {
        Self {
            instance_type,
            name: name.into(),
        }
    }
}

impl Display for MetricsFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.instance_type, SEPARATOR, self.name)
    }
}

/// A specialized `Result` type for metric-related operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// An error that can occur within the metrics system.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    /// The store keeps no queryable partition for this instance type.
    #[error("Unsupported instance type {0}")]
    UnsupportedInstanceType(InstanceType),
    /// A full metric name could not be parsed.
    #[error("Invalid metric name: {0}")]
    InvalidMetricName(String),
    /// A lookup named an index the container was not built with.
    #[error("Unknown index: {0}")]
    UnknownIndex(String),
    /// No aggregator is registered under this name.
    #[error("Aggregator not found: {0}")]
    AggregatorNotFound(String),
    /// An error originating from the storage layer.
    #[error("Storage error: {0}")]
    StorageError(String),
    /// A configuration entry is not usable.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_formatting() {
        let worker = MetricSample::worker("10.0.0.1", "BytesRead", 1.0);
        assert_eq!(worker.full_name(), "Worker.10_0_0_1.BytesRead");

        let client = MetricSample::client("host-a", "c1", "BytesRead", 1.0);
        assert_eq!(client.full_name(), "Client.host-a:c1.BytesRead");

        let master = MetricSample::new(InstanceType::Master, None, "Uptime", 1.0);
        assert_eq!(master.full_name(), "Master.Uptime");
    }

    #[test]
    fn test_instance_key() {
        assert_eq!(instance_key_for(Some("h"), None), "h");
        assert_eq!(instance_key_for(Some("h"), Some("c1")), "h:c1");
        assert_eq!(instance_key_for(None, Some("c1")), ":c1");
        assert_eq!(instance_key_for(None, None), "");

        let client = MetricSample::client("10.0.0.1", "c1", "BytesRead", 1.0);
        assert_eq!(client.instance_key(), "10_0_0_1:c1");

        let parsed = MetricSample::from_full_name("Client.10_0_0_1:c1.BytesRead", 1.0).unwrap();
        assert_eq!(parsed.instance_key(), client.instance_key());
    }

    #[test]
    fn test_parse_full_name() {
        let sample = MetricSample::from_full_name("Client.host_a:c1.BytesRead", 7.0).unwrap();
        assert_eq!(sample.instance_type(), InstanceType::Client);
        assert_eq!(sample.hostname(), Some("host_a"));
        assert_eq!(sample.instance_id(), Some("c1"));
        assert_eq!(sample.name(), "BytesRead");
        assert_eq!(sample.value(), 7.0);
        assert_eq!(sample.full_name(), "Client.host_a:c1.BytesRead");

        let master = MetricSample::from_full_name("Master.Uptime", 3.0).unwrap();
        assert_eq!(master.hostname(), None);
        assert_eq!(master.name(), "Uptime");
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for bad in ["Worker", "Worker.", "Worker.host.", "Nope.host.x", "Worker..x"] {
            let result = MetricSample::from_full_name(bad, 0.0);
            assert!(
                matches!(result, Err(MetricsError::InvalidMetricName(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_instance_type_round_trip() {
        for ty in [
            InstanceType::Cluster,
            InstanceType::Master,
            InstanceType::Worker,
            InstanceType::Client,
        ] {
            assert_eq!(ty.to_string().parse::<InstanceType>().unwrap(), ty);
        }
        assert_eq!("WORKER".parse::<InstanceType>().unwrap(), InstanceType::Worker);
    }

    #[test]
    fn test_filter_serde_and_display() {
        let filter = MetricsFilter::new(InstanceType::Worker, "BytesRead");
        assert_eq!(filter.to_string(), "Worker.BytesRead");

        let json = serde_json::to_string(&filter).unwrap();
        let back: MetricsFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn test_error_display() {
        let err = MetricsError::UnsupportedInstanceType(InstanceType::Client);
        assert_eq!(err.to_string(), "Unsupported instance type Client");
    }
}
