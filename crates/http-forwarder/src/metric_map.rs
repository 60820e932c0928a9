// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Aggregated metrics keyed by kind, then name, then tag set.

use crate::metric::{Metric, MetricType};
use fnv::FnvBuildHasher;
use hashbrown::hash_map::Entry;
use ustr::Ustr;

pub type FnvHashMap<K, V> = hashbrown::HashMap<K, V, FnvBuildHasher>;
pub type FnvHashSet<T> = hashbrown::HashSet<T, FnvBuildHasher>;

/// Records of one metric name, keyed by tags key.
pub type TagMap<T> = FnvHashMap<Ustr, T>;
/// Records of one kind, keyed by metric name.
pub type NameMap<T> = FnvHashMap<Ustr, TagMap<T>>;

#[derive(Clone, Debug, PartialEq)]
pub struct Counter {
    pub value: i64,
    pub timestamp: i64,
    pub source: String,
    pub hostname: String,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Gauge {
    pub value: f64,
    pub timestamp: i64,
    pub source: String,
    pub hostname: String,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Set {
    pub values: FnvHashSet<String>,
    pub timestamp: i64,
    pub source: String,
    pub hostname: String,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Timer {
    pub values: Vec<f64>,
    /// Number of samples the values stand for once client side sampling is undone
    pub sampled_count: f64,
    pub timestamp: i64,
    pub source: String,
    pub hostname: String,
    pub tags: Vec<String>,
}

/// Point-wise combination of two records for the same name and tag set.
pub trait Merge {
    fn merge(&mut self, other: Self);
}

impl Merge for Counter {
    fn merge(&mut self, other: Self) {
        self.value = self.value.saturating_add(other.value);
        self.timestamp = self.timestamp.max(other.timestamp);
    }
}

impl Merge for Gauge {
    fn merge(&mut self, other: Self) {
        // last write wins, ties go to the incoming value
        if other.timestamp >= self.timestamp {
            *self = other;
        }
    }
}

impl Merge for Set {
    fn merge(&mut self, other: Self) {
        self.values.extend(other.values);
        self.timestamp = self.timestamp.max(other.timestamp);
    }
}

impl Merge for Timer {
    fn merge(&mut self, other: Self) {
        self.values.extend(other.values);
        self.sampled_count += other.sampled_count;
        self.timestamp = self.timestamp.max(other.timestamp);
    }
}

fn merge_into<T: Merge>(to: &mut NameMap<T>, from: NameMap<T>) {
    for (name, tag_map) in from {
        let to_tags = to.entry(name).or_default();
        for (tags_key, record) in tag_map {
            match to_tags.entry(tags_key) {
                Entry::Occupied(mut existing) => existing.get_mut().merge(record),
                Entry::Vacant(vacant) => {
                    vacant.insert(record);
                }
            }
        }
    }
}

fn count<T>(map: &NameMap<T>) -> usize {
    map.values().map(|tags| tags.len()).sum()
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricMap {
    pub counters: NameMap<Counter>,
    pub gauges: NameMap<Gauge>,
    pub sets: NameMap<Set>,
    pub timers: NameMap<Timer>,
}

impl MetricMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges every map into a single new one.
    pub fn merged(maps: impl IntoIterator<Item = MetricMap>) -> Self {
        let mut merged = Self::new();
        for map in maps {
            merged.merge(map);
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
            && self.gauges.is_empty()
            && self.sets.is_empty()
            && self.timers.is_empty()
    }

    /// Number of distinct name and tag set combinations across all kinds.
    pub fn len(&self) -> usize {
        count(&self.counters) + count(&self.gauges) + count(&self.sets) + count(&self.timers)
    }

    pub fn merge(&mut self, other: MetricMap) {
        merge_into(&mut self.counters, other.counters);
        merge_into(&mut self.gauges, other.gauges);
        merge_into(&mut self.sets, other.sets);
        merge_into(&mut self.timers, other.timers);
    }

    /// Folds a raw sample into the map.
    pub fn receive(&mut self, metric: Metric) {
        let rate = metric.effective_rate();
        match metric.kind {
            MetricType::Counter => {
                // truncation matches the integer counters on the wire
                let value = (metric.value / rate) as i64;
                let record = Counter {
                    value,
                    timestamp: metric.timestamp,
                    source: metric.source,
                    hostname: metric.hostname,
                    tags: metric.tags,
                };
                insert_or_merge(&mut self.counters, metric.name, metric.tags_key, record);
            }
            MetricType::Gauge => {
                let record = Gauge {
                    value: metric.value,
                    timestamp: metric.timestamp,
                    source: metric.source,
                    hostname: metric.hostname,
                    tags: metric.tags,
                };
                // a fresh sample always replaces the previous value
                self.gauges
                    .entry(metric.name)
                    .or_default()
                    .insert(metric.tags_key, record);
            }
            MetricType::Set => {
                let mut values = FnvHashSet::default();
                values.insert(metric.string_value);
                let record = Set {
                    values,
                    timestamp: metric.timestamp,
                    source: metric.source,
                    hostname: metric.hostname,
                    tags: metric.tags,
                };
                insert_or_merge(&mut self.sets, metric.name, metric.tags_key, record);
            }
            MetricType::Timer => {
                let record = Timer {
                    values: vec![metric.value],
                    sampled_count: 1.0 / rate,
                    timestamp: metric.timestamp,
                    source: metric.source,
                    hostname: metric.hostname,
                    tags: metric.tags,
                };
                insert_or_merge(&mut self.timers, metric.name, metric.tags_key, record);
            }
        }
    }

    pub fn receive_all(&mut self, metrics: impl IntoIterator<Item = Metric>) {
        for metric in metrics {
            self.receive(metric);
        }
    }
}

fn insert_or_merge<T: Merge>(map: &mut NameMap<T>, name: Ustr, tags_key: Ustr, record: T) {
    match map.entry(name).or_default().entry(tags_key) {
        Entry::Occupied(mut existing) => existing.get_mut().merge(record),
        Entry::Vacant(vacant) => {
            vacant.insert(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ustr::ustr;

    fn tags() -> Vec<String> {
        vec!["env:prod".to_string()]
    }

    fn map_of(metrics: Vec<Metric>) -> MetricMap {
        let mut map = MetricMap::new();
        map.receive_all(metrics);
        map
    }

    fn counter_value(map: &MetricMap, name: &str) -> i64 {
        map.counters[&ustr(name)][&ustr("env:prod")].value
    }

    #[test]
    fn test_merge_counters_sum() {
        let mut a = map_of(vec![Metric::new("requests", MetricType::Counter, 5.0, tags())]);
        let b = map_of(vec![Metric::new("requests", MetricType::Counter, 3.0, tags())]);
        a.merge(b);
        assert_eq!(counter_value(&a, "requests"), 8);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_merge_gauges_last_write_wins() {
        let mut a = map_of(vec![
            Metric::new("cpu", MetricType::Gauge, 10.0, tags()).with_timestamp(1)
        ]);
        let b = map_of(vec![
            Metric::new("cpu", MetricType::Gauge, 12.0, tags()).with_timestamp(2)
        ]);
        a.merge(b);
        assert_eq!(a.gauges[&ustr("cpu")][&ustr("env:prod")].value, 12.0);

        // an older update does not overwrite a newer one
        let stale = map_of(vec![
            Metric::new("cpu", MetricType::Gauge, 3.0, tags()).with_timestamp(1)
        ]);
        a.merge(stale);
        assert_eq!(a.gauges[&ustr("cpu")][&ustr("env:prod")].value, 12.0);
    }

    #[test]
    fn test_receive_gauge_overwrites() {
        let map = map_of(vec![
            Metric::new("cpu", MetricType::Gauge, 10.0, tags()),
            Metric::new("cpu", MetricType::Gauge, 12.0, tags()),
        ]);
        assert_eq!(map.gauges[&ustr("cpu")][&ustr("env:prod")].value, 12.0);
    }

    #[test]
    fn test_merge_sets_union() {
        let mut a = map_of(vec![
            Metric::set_member("users", "a", tags()),
            Metric::set_member("users", "b", tags()),
        ]);
        let b = map_of(vec![
            Metric::set_member("users", "b", tags()),
            Metric::set_member("users", "c", tags()),
        ]);
        a.merge(b);
        let values = &a.sets[&ustr("users")][&ustr("env:prod")].values;
        let mut sorted: Vec<&str> = values.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        assert_eq!(sorted, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_timers_concatenate() {
        let mut a = map_of(vec![
            Metric::new("latency", MetricType::Timer, 1.5, tags()).with_rate(0.5)
        ]);
        let b = map_of(vec![
            Metric::new("latency", MetricType::Timer, 2.5, tags()),
            Metric::new("latency", MetricType::Timer, 3.5, tags()),
        ]);
        a.merge(b);
        let timer = &a.timers[&ustr("latency")][&ustr("env:prod")];
        assert_eq!(timer.values, vec![1.5, 2.5, 3.5]);
        assert_eq!(timer.sampled_count, 4.0);
    }

    #[test]
    fn test_receive_counter_scales_by_rate() {
        let map = map_of(vec![
            Metric::new("hits", MetricType::Counter, 1.0, tags()).with_rate(0.1)
        ]);
        assert_eq!(counter_value(&map, "hits"), 10);
    }

    #[test]
    fn test_distinct_tag_sets_stay_apart() {
        let map = map_of(vec![
            Metric::new("hits", MetricType::Counter, 1.0, vec!["env:prod".to_string()]),
            Metric::new("hits", MetricType::Counter, 1.0, vec!["env:dev".to_string()]),
        ]);
        assert_eq!(map.counters[&ustr("hits")].len(), 2);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_merged_empty() {
        let merged = MetricMap::merged(vec![MetricMap::new(), MetricMap::new()]);
        assert!(merged.is_empty());
        assert_eq!(merged.len(), 0);
    }

    proptest! {
        #[test]
        fn merged_counters_equal_the_sum(values in prop::collection::vec(0i64..1_000_000, 1..20)) {
            let maps = values.iter().map(|v| {
                map_of(vec![Metric::new("requests", MetricType::Counter, *v as f64, tags())])
            });
            let merged = MetricMap::merged(maps);
            prop_assert_eq!(counter_value(&merged, "requests"), values.iter().sum::<i64>());
        }

        #[test]
        fn merge_order_does_not_change_counters(a in 0i64..1_000_000, b in 0i64..1_000_000) {
            let left = MetricMap::merged(vec![
                map_of(vec![Metric::new("requests", MetricType::Counter, a as f64, tags())]),
                map_of(vec![Metric::new("requests", MetricType::Counter, b as f64, tags())]),
            ]);
            let right = MetricMap::merged(vec![
                map_of(vec![Metric::new("requests", MetricType::Counter, b as f64, tags())]),
                map_of(vec![Metric::new("requests", MetricType::Counter, a as f64, tags())]),
            ]);
            prop_assert_eq!(left, right);
        }
    }
}
