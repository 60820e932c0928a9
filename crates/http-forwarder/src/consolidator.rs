// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Merges batches arriving from many producers and emits them once per flush interval.
//!
//! Producers are spread over a fixed number of slots so they rarely contend on the same lock.
//! Every flush swaps each slot for an empty map and sends the taken maps downstream together.

use crate::metric::Metric;
use crate::metric_map::MetricMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct MetricConsolidator {
    slots: Vec<Mutex<MetricMap>>,
    next_slot: AtomicUsize,
    flush_interval: Duration,
    sink: mpsc::Sender<Vec<MetricMap>>,
}

impl MetricConsolidator {
    /// `slots` is clamped to at least one.
    pub fn new(
        slots: usize,
        flush_interval: Duration,
        sink: mpsc::Sender<Vec<MetricMap>>,
    ) -> Self {
        Self {
            slots: (0..slots.max(1))
                .map(|_| Mutex::new(MetricMap::new()))
                .collect(),
            next_slot: AtomicUsize::new(0),
            flush_interval,
            sink,
        }
    }

    pub fn receive_metrics(&self, metrics: Vec<Metric>) {
        let slot = self.pick_slot();
        #[allow(clippy::expect_used)]
        let mut map = slot.lock().expect("lock poisoned");
        map.receive_all(metrics);
    }

    pub fn receive_metric_map(&self, metric_map: MetricMap) {
        let slot = self.pick_slot();
        #[allow(clippy::expect_used)]
        let mut map = slot.lock().expect("lock poisoned");
        map.merge(metric_map);
    }

    fn pick_slot(&self) -> &Mutex<MetricMap> {
        let index = self.next_slot.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        &self.slots[index]
    }

    /// Swaps every slot for an empty map and returns what was taken.
    fn take_all(&self) -> Vec<MetricMap> {
        self.slots
            .iter()
            .map(|slot| {
                #[allow(clippy::expect_used)]
                let mut map = slot.lock().expect("lock poisoned");
                std::mem::take(&mut *map)
            })
            .collect()
    }

    /// Sends the current contents downstream. Returns false if cancelled or the receiver is gone.
    pub async fn flush(&self, cancel: &CancellationToken) -> bool {
        let maps = self.take_all();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = self.sink.send(maps) => match sent {
                Ok(()) => true,
                Err(_) => {
                    debug!("Consolidated metrics receiver dropped");
                    false
                }
            },
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        debug!("Metric consolidator started");
        let mut ticker = interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !self.flush(&cancel).await {
                        break;
                    }
                }
            }
        }
        debug!("Metric consolidator stopped");
    }
}
