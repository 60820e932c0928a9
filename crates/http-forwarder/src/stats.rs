// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery accounting, reported as counts since the previous report.

use crate::constants::{STAT_CREATED, STAT_DROPPED, STAT_INVALID, STAT_RETRIED, STAT_SENT};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Sink for internal telemetry.
pub trait Statser: Send + Sync {
    fn count(&self, name: &str, value: f64, tags: &[String]);
}

/// Writes every count to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatser;

impl Statser for LogStatser {
    fn count(&self, name: &str, value: f64, tags: &[String]) {
        info!(stat = name, value, ?tags, "stat count");
    }
}

#[derive(Debug, Default)]
pub struct ForwarderStats {
    invalid: AtomicU64,
    created: AtomicU64,
    sent: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
}

/// Counter values read at one point in time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Payloads which could not be built
    pub invalid: u64,
    /// Payloads which were built and handed to the sender
    pub created: u64,
    pub sent: u64,
    /// Retries; the first attempt and the final failure are not retries
    pub retried: u64,
    /// Payloads abandoned after the retry budget was spent
    pub dropped: u64,
}

impl ForwarderStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_invalid(&self) {
        self.invalid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values, leaving the counters untouched.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            invalid: self.invalid.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Reads and zeroes every counter.
    pub fn swap(&self) -> StatsSnapshot {
        StatsSnapshot {
            invalid: self.invalid.swap(0, Ordering::Relaxed),
            created: self.created.swap(0, Ordering::Relaxed),
            sent: self.sent.swap(0, Ordering::Relaxed),
            retried: self.retried.swap(0, Ordering::Relaxed),
            dropped: self.dropped.swap(0, Ordering::Relaxed),
        }
    }

    pub fn emit(&self, statser: &dyn Statser) {
        let window = self.swap();
        statser.count(STAT_INVALID, window.invalid as f64, &[]);
        statser.count(STAT_CREATED, window.created as f64, &[]);
        statser.count(STAT_SENT, window.sent as f64, &[]);
        statser.count(STAT_RETRIED, window.retried as f64, &[]);
        statser.count(STAT_DROPPED, window.dropped as f64, &[]);
    }
}
