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

//! Pull-evaluated gauges exported to an external metrics poller.

use meridian_core::telemetry::MetricsResult;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

type GaugeFn = dyn Fn() -> MetricsResult<f64> + Send + Sync;

/// A named, zero-argument callable computing its value on every read.
#[derive(Clone)]
pub struct Gauge {
    name: String,
    read: Arc<GaugeFn>,
}

impl Gauge {
    /// Creates a gauge reading its value from `read`.
    pub fn new<F>(name: impl Into<String>, read: F) -> Self
    where
        F: Fn() -> MetricsResult<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            read: Arc::new(read),
        }
    }

    /// The exported name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Computes the current value on the caller's thread.
    pub fn value(&self) -> MetricsResult<f64> {
        (self.read)()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The outcome of reading one gauge during a poll.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeReading {
    /// The gauge name.
    pub name: String,
    /// The computed value, or the error that prevented it.
    pub result: MetricsResult<f64>,
}

impl GaugeReading {
    /// The value, or `None` if this gauge is unavailable for this poll.
    pub fn value(&self) -> Option<f64> {
        self.result.as_ref().ok().copied()
    }
}

/// A thread-safe registry of gauges keyed by name.
#[derive(Debug, Clone, Default)]
pub struct GaugeRegistry {
    gauges: Arc<RwLock<BTreeMap<String, Gauge>>>,
}

impl GaugeRegistry {
    /// Creates a new, empty gauge registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `gauge` unless one is already bound under its name.
    /// Returns whether it was registered.
    pub fn register_if_absent(&self, gauge: Gauge) -> bool {
        let mut gauges = self.gauges.write().unwrap_or_else(PoisonError::into_inner);
        if gauges.contains_key(gauge.name()) {
            return false;
        }
        log::info!("Registered gauge: {}", gauge.name());
        gauges.insert(gauge.name().to_string(), gauge);
        true
    }

    /// Returns the gauge bound under `name`.
    pub fn get(&self, name: &str) -> Option<Gauge> {
        self.gauges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Returns every gauge name, sorted.
    pub fn names(&self) -> Vec<String> {
        self.gauges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// The number of registered gauges.
    pub fn len(&self) -> usize {
        self.gauges.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no gauge is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads every gauge, in name order.
    ///
    /// A failing gauge yields an error reading and does not stop the others.
    /// Gauges are evaluated outside the registry lock.
    pub fn read_all(&self) -> Vec<GaugeReading> {
        let gauges: Vec<Gauge> = self
            .gauges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        gauges
            .into_iter()
            .map(|gauge| GaugeReading {
                result: gauge.value(),
                name: gauge.name,
            })
            .collect()
    }
}
