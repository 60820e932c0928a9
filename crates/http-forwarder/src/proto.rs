// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire messages understood by the collector, and translation from the in-memory types.
//!
//! Maps are ordered so a given batch always serializes to the same bytes.

use crate::event::{AlertType, Event, Priority};
use crate::metric_map::{MetricMap, NameMap};
use std::collections::BTreeMap;

#[derive(Clone, PartialEq, prost::Message)]
pub struct RawMessageV2 {
    #[prost(btree_map = "string, message", tag = "1")]
    pub gauges: BTreeMap<String, GaugeTagV2>,
    #[prost(btree_map = "string, message", tag = "2")]
    pub counters: BTreeMap<String, CounterTagV2>,
    #[prost(btree_map = "string, message", tag = "3")]
    pub sets: BTreeMap<String, SetTagV2>,
    #[prost(btree_map = "string, message", tag = "4")]
    pub timers: BTreeMap<String, TimerTagV2>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GaugeTagV2 {
    #[prost(btree_map = "string, message", tag = "1")]
    pub tag_map: BTreeMap<String, RawGaugeV2>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CounterTagV2 {
    #[prost(btree_map = "string, message", tag = "1")]
    pub tag_map: BTreeMap<String, RawCounterV2>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SetTagV2 {
    #[prost(btree_map = "string, message", tag = "1")]
    pub tag_map: BTreeMap<String, RawSetV2>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TimerTagV2 {
    #[prost(btree_map = "string, message", tag = "1")]
    pub tag_map: BTreeMap<String, RawTimerV2>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RawGaugeV2 {
    #[prost(string, repeated, tag = "1")]
    pub tags: Vec<String>,
    #[prost(string, tag = "2")]
    pub hostname: String,
    #[prost(double, tag = "3")]
    pub value: f64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RawCounterV2 {
    #[prost(string, repeated, tag = "1")]
    pub tags: Vec<String>,
    #[prost(string, tag = "2")]
    pub hostname: String,
    #[prost(int64, tag = "3")]
    pub value: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RawSetV2 {
    #[prost(string, repeated, tag = "1")]
    pub tags: Vec<String>,
    #[prost(string, tag = "2")]
    pub hostname: String,
    #[prost(string, repeated, tag = "3")]
    pub values: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RawTimerV2 {
    #[prost(string, repeated, tag = "1")]
    pub tags: Vec<String>,
    #[prost(string, tag = "2")]
    pub hostname: String,
    #[prost(double, tag = "3")]
    pub sample_count: f64,
    #[prost(double, repeated, tag = "4")]
    pub values: Vec<f64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EventV2 {
    #[prost(string, tag = "1")]
    pub title: String,
    #[prost(string, tag = "2")]
    pub text: String,
    #[prost(int64, tag = "3")]
    pub date_happened: i64,
    #[prost(string, tag = "4")]
    pub hostname: String,
    #[prost(string, tag = "5")]
    pub aggregation_key: String,
    #[prost(string, tag = "6")]
    pub source_type_name: String,
    #[prost(string, repeated, tag = "7")]
    pub tags: Vec<String>,
    #[prost(string, tag = "8")]
    pub source_ip: String,
    #[prost(enumeration = "event_v2::EventPriority", tag = "9")]
    pub priority: i32,
    #[prost(enumeration = "event_v2::AlertType", tag = "10")]
    pub alert_type: i32,
}

pub mod event_v2 {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum EventPriority {
        Normal = 0,
        Low = 1,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum AlertType {
        Info = 0,
        Warning = 1,
        Error = 2,
        Success = 3,
    }
}

fn translate<T: ToRaw, W>(
    from: &NameMap<T>,
    wrap: impl Fn(BTreeMap<String, T::Raw>) -> W,
) -> BTreeMap<String, W> {
    from.iter()
        .map(|(name, tag_map)| {
            let raw = tag_map
                .iter()
                .map(|(tags_key, record)| (tags_key.to_string(), record.to_raw()))
                .collect();
            (name.to_string(), wrap(raw))
        })
        .collect()
}

/// Conversion of one aggregated record into its wire form.
pub trait ToRaw {
    type Raw;
    fn to_raw(&self) -> Self::Raw;
}

impl ToRaw for crate::metric_map::Gauge {
    type Raw = RawGaugeV2;
    fn to_raw(&self) -> RawGaugeV2 {
        RawGaugeV2 {
            tags: self.tags.clone(),
            hostname: self.hostname.clone(),
            value: self.value,
        }
    }
}

impl ToRaw for crate::metric_map::Counter {
    type Raw = RawCounterV2;
    fn to_raw(&self) -> RawCounterV2 {
        RawCounterV2 {
            tags: self.tags.clone(),
            hostname: self.hostname.clone(),
            value: self.value,
        }
    }
}

impl ToRaw for crate::metric_map::Set {
    type Raw = RawSetV2;
    fn to_raw(&self) -> RawSetV2 {
        let mut values: Vec<String> = self.values.iter().cloned().collect();
        values.sort_unstable();
        RawSetV2 {
            tags: self.tags.clone(),
            hostname: self.hostname.clone(),
            values,
        }
    }
}

impl ToRaw for crate::metric_map::Timer {
    type Raw = RawTimerV2;
    fn to_raw(&self) -> RawTimerV2 {
        RawTimerV2 {
            tags: self.tags.clone(),
            hostname: self.hostname.clone(),
            sample_count: self.sampled_count,
            values: self.values.clone(),
        }
    }
}

impl From<&MetricMap> for RawMessageV2 {
    fn from(metric_map: &MetricMap) -> Self {
        RawMessageV2 {
            gauges: translate(&metric_map.gauges, |tag_map| GaugeTagV2 { tag_map }),
            counters: translate(&metric_map.counters, |tag_map| CounterTagV2 { tag_map }),
            sets: translate(&metric_map.sets, |tag_map| SetTagV2 { tag_map }),
            timers: translate(&metric_map.timers, |tag_map| TimerTagV2 { tag_map }),
        }
    }
}

impl From<Priority> for event_v2::EventPriority {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Normal => event_v2::EventPriority::Normal,
            Priority::Low => event_v2::EventPriority::Low,
        }
    }
}

impl From<AlertType> for event_v2::AlertType {
    fn from(alert_type: AlertType) -> Self {
        match alert_type {
            AlertType::Info => event_v2::AlertType::Info,
            AlertType::Warning => event_v2::AlertType::Warning,
            AlertType::Error => event_v2::AlertType::Error,
            AlertType::Success => event_v2::AlertType::Success,
        }
    }
}

impl From<&Event> for EventV2 {
    fn from(event: &Event) -> Self {
        EventV2 {
            title: event.title.clone(),
            text: event.text.clone(),
            date_happened: event.date_happened,
            hostname: event.hostname.clone(),
            aggregation_key: event.aggregation_key.clone(),
            source_type_name: event.source_type_name.clone(),
            tags: event.tags.clone(),
            source_ip: event.source_ip.clone(),
            priority: event_v2::EventPriority::from(event.priority) as i32,
            alert_type: event_v2::AlertType::from(event.alert_type) as i32,
        }
    }
}
