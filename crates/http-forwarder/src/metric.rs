// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A single sample as produced by a statsd parser.

use ustr::{ustr, Ustr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum MetricType {
    #[display("counter")]
    Counter,
    #[display("gauge")]
    Gauge,
    #[display("set")]
    Set,
    #[display("timer")]
    Timer,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    pub name: Ustr,
    pub kind: MetricType,
    /// Numeric value for counters, gauges and timers
    pub value: f64,
    /// Member value for sets
    pub string_value: String,
    /// Client-side sample rate in (0, 1]
    pub rate: f64,
    pub tags: Vec<String>,
    /// Canonical key identifying the tag set within a metric name
    pub tags_key: Ustr,
    pub hostname: String,
    /// Address of the client which sent the metric
    pub source: String,
    /// Unix time in nanoseconds
    pub timestamp: i64,
}

impl Metric {
    pub fn new(name: &str, kind: MetricType, value: f64, tags: Vec<String>) -> Self {
        let tags_key = tags_key(&tags);
        Self {
            name: ustr(name),
            kind,
            value,
            string_value: String::new(),
            rate: 1.0,
            tags,
            tags_key,
            hostname: String::new(),
            source: String::new(),
            timestamp: 0,
        }
    }

    pub fn set_member(name: &str, member: &str, tags: Vec<String>) -> Self {
        Self {
            string_value: member.to_string(),
            ..Self::new(name, MetricType::Set, 0.0, tags)
        }
    }

    #[must_use]
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    #[must_use]
    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = hostname.to_string();
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sample rate to scale by; unset or invalid rates count as unsampled.
    pub(crate) fn effective_rate(&self) -> f64 {
        if self.rate > 0.0 && self.rate <= 1.0 {
            self.rate
        } else {
            1.0
        }
    }
}

/// Sorted, comma joined tags. Order of the input tags does not matter.
pub fn tags_key(tags: &[String]) -> Ustr {
    let mut sorted: Vec<&str> = tags.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    ustr(&sorted.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_key_is_order_independent() {
        let a = tags_key(&["env:prod".to_string(), "az:1".to_string()]);
        let b = tags_key(&["az:1".to_string(), "env:prod".to_string()]);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "az:1,env:prod");
        assert_eq!(tags_key(&[]).as_str(), "");
    }

    #[test]
    fn test_effective_rate() {
        let metric = Metric::new("hits", MetricType::Counter, 1.0, vec![]);
        assert_eq!(metric.clone().with_rate(0.25).effective_rate(), 0.25);
        assert_eq!(metric.clone().with_rate(0.0).effective_rate(), 1.0);
        assert_eq!(metric.with_rate(3.0).effective_rate(), 1.0);
    }

    #[test]
    fn test_set_member() {
        let metric = Metric::set_member("users", "alice", vec!["env:prod".to_string()]);
        assert_eq!(metric.kind, MetricType::Set);
        assert_eq!(metric.string_value, "alice");
        assert_eq!(metric.tags_key.as_str(), "env:prod");
        assert_eq!(metric.kind.to_string(), "set");
    }
}
