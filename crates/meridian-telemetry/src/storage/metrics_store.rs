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

//! The store of worker and client samples.

use crate::storage::indexed_set::{IndexDefinition, IndexedSet};
use meridian_core::telemetry::{
    instance_key_for, InstanceType, MetricSample, MetricsError, MetricsResult,
};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

fn full_name_key(sample: &MetricSample) -> String {
    sample.full_name().to_string()
}

fn name_key(sample: &MetricSample) -> String {
    sample.name().to_string()
}

fn instance_key(sample: &MetricSample) -> String {
    sample.instance_key()
}

/// Unique per partition.
pub const FULL_NAME_INDEX: IndexDefinition<MetricSample> =
    IndexDefinition::unique("full_name", full_name_key);
/// Short name, shared by every instance reporting the metric.
pub const NAME_INDEX: IndexDefinition<MetricSample> =
    IndexDefinition::non_unique("name", name_key);
/// Composite (hostname, instance id) key, used to replace a reporter's batch.
pub const INSTANCE_KEY_INDEX: IndexDefinition<MetricSample> =
    IndexDefinition::non_unique("instance_key", instance_key);

fn new_partition() -> IndexedSet<MetricSample> {
    IndexedSet::new(FULL_NAME_INDEX, &[NAME_INDEX, INSTANCE_KEY_INDEX])
}

#[derive(Debug)]
struct Partitions {
    workers: IndexedSet<MetricSample>,
    clients: IndexedSet<MetricSample>,
}

/// Statistics about the store contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Number of worker samples stored
    pub worker_metrics: usize,
    /// Number of client samples stored
    pub client_metrics: usize,
    /// Number of distinct worker reporters
    pub worker_instances: usize,
    /// Number of distinct client reporters
    pub client_instances: usize,
}

/// A store of the latest samples reported by workers and clients.
///
/// Both partitions sit behind one `RwLock`. Every ingestion call replaces
/// the reporter's previous batch under the write lock, so a concurrent query
/// sees either the whole old batch or the whole new one.
///
/// Within a partition the full name is unique; a second sample with the same
/// full name replaces the first, in debug and release builds alike.
#[derive(Debug)]
pub struct MetricsStore {
    partitions: RwLock<Partitions>,
}

impl MetricsStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(Partitions {
                workers: new_partition(),
                clients: new_partition(),
            }),
        }
    }

    /// Replaces every sample previously reported by the worker on `hostname`
    /// with `metrics`.
    ///
    /// `hostname` may be raw or escaped; both resolve to the same reporter.
    pub fn put_worker_metrics(
        &self,
        hostname: &str,
        metrics: impl IntoIterator<Item = MetricSample>,
    ) -> MetricsResult<()> {
        let key = instance_key_for(Some(hostname), None);
        let mut partitions = self.write()?;
        let removed = partitions.workers.remove_by_field(&INSTANCE_KEY_INDEX, &key)?;

        let mut inserted = 0;
        for metric in metrics {
            partitions.workers.add(metric);
            inserted += 1;
        }

        log::debug!("Worker {key}: replaced {removed} metrics with {inserted}");
        Ok(())
    }

    /// Replaces every sample previously reported by `client_id` on
    /// `hostname` with `metrics`.
    ///
    /// Samples without a hostname cannot be attributed to a reporter and are
    /// dropped.
    pub fn put_client_metrics(
        &self,
        hostname: &str,
        client_id: &str,
        metrics: impl IntoIterator<Item = MetricSample>,
    ) -> MetricsResult<()> {
        let key = instance_key_for(Some(hostname), Some(client_id));
        let mut partitions = self.write()?;
        let removed = partitions.clients.remove_by_field(&INSTANCE_KEY_INDEX, &key)?;

        let mut inserted = 0;
        let mut dropped = 0;
        for metric in metrics {
            if metric.hostname().is_none() {
                dropped += 1;
                continue;
            }
            partitions.clients.add(metric);
            inserted += 1;
        }

        log::debug!(
            "Client {key}: replaced {removed} metrics with {inserted}, dropped {dropped} without hostname"
        );
        Ok(())
    }

    /// Gets all the metrics of `instance_type` whose short name is `name`.
    ///
    /// Only worker metrics can be queried this way; any other instance type
    /// fails with [`MetricsError::UnsupportedInstanceType`]. The result is a
    /// snapshot ordered by full name.
    pub fn get_metrics_by_instance_type_and_name(
        &self,
        instance_type: InstanceType,
        name: &str,
    ) -> MetricsResult<Vec<Arc<MetricSample>>> {
        if instance_type != InstanceType::Worker {
            return Err(MetricsError::UnsupportedInstanceType(instance_type));
        }
        let partitions = self.read()?;
        partitions.workers.get_by_field(&NAME_INDEX, name)
    }

    /// Clears all the metrics.
    pub fn clear(&self) -> MetricsResult<()> {
        let mut partitions = self.write()?;
        partitions.workers.clear();
        partitions.clients.clear();
        log::debug!("Metrics store cleared");
        Ok(())
    }

    /// Number of worker samples stored
    pub fn worker_metric_count(&self) -> MetricsResult<usize> {
        Ok(self.read()?.workers.len())
    }

    /// Number of client samples stored
    pub fn client_metric_count(&self) -> MetricsResult<usize> {
        Ok(self.read()?.clients.len())
    }

    /// Get statistics about this store
    pub fn get_stats(&self) -> MetricsResult<StoreStats> {
        let partitions = self.read()?;
        Ok(StoreStats {
            worker_metrics: partitions.workers.len(),
            client_metrics: partitions.clients.len(),
            worker_instances: partitions.workers.distinct_keys(&INSTANCE_KEY_INDEX)?,
            client_instances: partitions.clients.distinct_keys(&INSTANCE_KEY_INDEX)?,
        })
    }

    fn read(&self) -> MetricsResult<RwLockReadGuard<'_, Partitions>> {
        self.partitions
            .read()
            .map_err(|_| MetricsError::StorageError("Failed to acquire read lock".to_string()))
    }

    fn write(&self) -> MetricsResult<RwLockWriteGuard<'_, Partitions>> {
        self.partitions
            .write()
            .map_err(|_| MetricsError::StorageError("Failed to acquire write lock".to_string()))
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(samples: &[Arc<MetricSample>]) -> Vec<f64> {
        samples.iter().map(|s| s.value()).collect()
    }

    #[test]
    fn test_put_and_query_worker_metrics() {
        let store = MetricsStore::new();
        store
            .put_worker_metrics(
                "host-a",
                vec![
                    MetricSample::worker("host-a", "BytesRead", 10.0),
                    MetricSample::worker("host-a", "BytesWritten", 5.0),
                ],
            )
            .unwrap();
        store
            .put_worker_metrics("host-b", vec![MetricSample::worker("host-b", "BytesRead", 20.0)])
            .unwrap();

        let read = store
            .get_metrics_by_instance_type_and_name(InstanceType::Worker, "BytesRead")
            .unwrap();
        assert_eq!(values(&read), vec![10.0, 20.0]);
        assert_eq!(store.worker_metric_count().unwrap(), 3);
    }

    #[test]
    fn test_put_replaces_previous_batch() {
        let store = MetricsStore::new();
        store
            .put_worker_metrics(
                "host-a",
                vec![
                    MetricSample::worker("host-a", "BytesRead", 10.0),
                    MetricSample::worker("host-a", "Stale", 1.0),
                ],
            )
            .unwrap();
        store
            .put_worker_metrics("host-a", vec![MetricSample::worker("host-a", "BytesRead", 42.0)])
            .unwrap();

        let read = store
            .get_metrics_by_instance_type_and_name(InstanceType::Worker, "BytesRead")
            .unwrap();
        assert_eq!(values(&read), vec![42.0]);
        assert!(store
            .get_metrics_by_instance_type_and_name(InstanceType::Worker, "Stale")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parsed_batch_is_replaced_by_raw_hostname() {
        let store = MetricsStore::new();
        let parsed = ["Worker.10_0_0_1.BytesRead", "Worker.10_0_0_1.Stale"]
            .into_iter()
            .map(|name| MetricSample::from_full_name(name, 1.0))
            .collect::<MetricsResult<Vec<_>>>()
            .unwrap();
        store.put_worker_metrics("10.0.0.1", parsed).unwrap();
        assert_eq!(store.worker_metric_count().unwrap(), 2);

        let latest = vec![MetricSample::worker("10.0.0.1", "BytesRead", 2.0)];
        store.put_worker_metrics("10.0.0.1", latest).unwrap();
        assert_eq!(store.worker_metric_count().unwrap(), 1);
        assert!(store
            .get_metrics_by_instance_type_and_name(InstanceType::Worker, "Stale")
            .unwrap()
            .is_empty());
        let read = store
            .get_metrics_by_instance_type_and_name(InstanceType::Worker, "BytesRead")
            .unwrap();
        assert_eq!(values(&read), vec![2.0]);

        // The escaped form names the same reporter.
        store.put_worker_metrics("10_0_0_1", Vec::new()).unwrap();
        assert_eq!(store.worker_metric_count().unwrap(), 0);
    }

    #[test]
    fn test_parsed_client_batch_is_replaced_by_raw_hostname() {
        let store = MetricsStore::new();
        let parsed = MetricSample::from_full_name("Client.10_0_0_1:c1.Stale", 1.0).unwrap();
        store.put_client_metrics("10.0.0.1", "c1", vec![parsed]).unwrap();

        store
            .put_client_metrics(
                "10.0.0.1",
                "c1",
                vec![MetricSample::client("10.0.0.1", "c1", "BytesRead", 2.0)],
            )
            .unwrap();
        let stats = store.get_stats().unwrap();
        assert_eq!(stats.client_metrics, 1);
        assert_eq!(stats.client_instances, 1);
    }

    #[test]
    fn test_empty_batch_evicts_instance() {
        let store = MetricsStore::new();
        store
            .put_worker_metrics("host-a", vec![MetricSample::worker("host-a", "BytesRead", 1.0)])
            .unwrap();
        store.put_worker_metrics("host-a", Vec::new()).unwrap();
        assert_eq!(store.worker_metric_count().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_full_name_keeps_last() {
        let store = MetricsStore::new();
        store
            .put_worker_metrics(
                "host-a",
                vec![
                    MetricSample::worker("host-a", "BytesRead", 1.0),
                    MetricSample::worker("host-a", "BytesRead", 2.0),
                ],
            )
            .unwrap();

        let read = store
            .get_metrics_by_instance_type_and_name(InstanceType::Worker, "BytesRead")
            .unwrap();
        assert_eq!(values(&read), vec![2.0]);
    }

    #[test]
    fn test_client_metrics_without_hostname_are_dropped() {
        let store = MetricsStore::new();
        store
            .put_client_metrics(
                "host-a",
                "c1",
                vec![
                    MetricSample::client("host-a", "c1", "BytesRead", 1.0),
                    MetricSample::with_instance_id(
                        InstanceType::Client,
                        None,
                        Some("c1".to_string()),
                        "BytesRead",
                        2.0,
                    ),
                ],
            )
            .unwrap();
        assert_eq!(store.client_metric_count().unwrap(), 1);

        // The admitted sample is still replaced by the next batch.
        store.put_client_metrics("host-a", "c1", Vec::new()).unwrap();
        assert_eq!(store.client_metric_count().unwrap(), 0);
    }

    #[test]
    fn test_clients_are_keyed_by_host_and_id() {
        let store = MetricsStore::new();
        store
            .put_client_metrics("h", "c1", vec![MetricSample::client("h", "c1", "BytesRead", 1.0)])
            .unwrap();
        store
            .put_client_metrics("h", "c2", vec![MetricSample::client("h", "c2", "BytesRead", 2.0)])
            .unwrap();
        store
            .put_client_metrics("h", "c1", vec![MetricSample::client("h", "c1", "BytesRead", 3.0)])
            .unwrap();

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.client_metrics, 2);
        assert_eq!(stats.client_instances, 2);
    }

    #[test]
    fn test_partitions_are_isolated() {
        let store = MetricsStore::new();
        store
            .put_worker_metrics("h", vec![MetricSample::worker("h", "BytesRead", 1.0)])
            .unwrap();
        store
            .put_client_metrics("h", "c1", vec![MetricSample::client("h", "c1", "BytesRead", 9.0)])
            .unwrap();

        let read = store
            .get_metrics_by_instance_type_and_name(InstanceType::Worker, "BytesRead")
            .unwrap();
        assert_eq!(values(&read), vec![1.0]);

        // Replacing the worker batch leaves the client untouched.
        store.put_worker_metrics("h", Vec::new()).unwrap();
        assert_eq!(store.client_metric_count().unwrap(), 1);
    }

    #[test]
    fn test_unsupported_instance_types() {
        let store = MetricsStore::new();
        store
            .put_client_metrics("h", "c1", vec![MetricSample::client("h", "c1", "BytesRead", 1.0)])
            .unwrap();

        for ty in [InstanceType::Client, InstanceType::Master, InstanceType::Cluster] {
            assert_eq!(
                store.get_metrics_by_instance_type_and_name(ty, "BytesRead"),
                Err(MetricsError::UnsupportedInstanceType(ty))
            );
        }
    }

    #[test]
    fn test_query_result_is_a_snapshot() {
        let store = MetricsStore::new();
        store
            .put_worker_metrics("h", vec![MetricSample::worker("h", "BytesRead", 1.0)])
            .unwrap();
        let before = store
            .get_metrics_by_instance_type_and_name(InstanceType::Worker, "BytesRead")
            .unwrap();

        store
            .put_worker_metrics("h", vec![MetricSample::worker("h", "BytesRead", 2.0)])
            .unwrap();
        assert_eq!(values(&before), vec![1.0]);
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let store = Arc::new(MetricsStore::new());
        let poisoner = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.partitions.write().unwrap();
            panic!("writer panicked while holding the lock");
        })
        .join();

        assert!(matches!(
            store.worker_metric_count(),
            Err(MetricsError::StorageError(_))
        ));
        assert!(matches!(
            store.client_metric_count(),
            Err(MetricsError::StorageError(_))
        ));
        assert!(store.get_stats().is_err());
    }

    #[test]
    fn test_clear() {
        let store = MetricsStore::new();
        store
            .put_worker_metrics("h", vec![MetricSample::worker("h", "BytesRead", 1.0)])
            .unwrap();
        store
            .put_client_metrics("h", "c1", vec![MetricSample::client("h", "c1", "BytesRead", 1.0)])
            .unwrap();

        store.clear().unwrap();
        assert_eq!(store.get_stats().unwrap(), StoreStats::default());
        assert!(store
            .get_metrics_by_instance_type_and_name(InstanceType::Worker, "BytesRead")
            .unwrap()
            .is_empty());

        store
            .put_worker_metrics("h", vec![MetricSample::worker("h", "BytesRead", 5.0)])
            .unwrap();
        assert_eq!(store.worker_metric_count().unwrap(), 1);
    }
}
