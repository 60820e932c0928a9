// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Exponential backoff with jitter, bounded by a total elapsed time.

use crate::config::BackoffConfig;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff cursor for one delivery. Elapsed time is measured from creation.
#[derive(Debug)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    max_elapsed_time: Duration,
    current_interval: Duration,
    start: Instant,
}

impl ExponentialBackoff {
    pub fn new(config: &BackoffConfig, max_elapsed_time: Duration) -> Self {
        Self {
            config: config.clone(),
            max_elapsed_time,
            current_interval: config.initial_interval,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Duration to wait before the next attempt, or `None` once the elapsed time budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.elapsed() > self.max_elapsed_time {
            return None;
        }
        let next = randomize(
            self.config.randomization_factor,
            rand::rng().random::<f64>(),
            self.current_interval,
        );
        self.increment_current_interval();
        Some(next)
    }

    fn increment_current_interval(&mut self) {
        let max = self.config.max_interval.as_secs_f64();
        let current = self.current_interval.as_secs_f64();
        self.current_interval = if current >= max / self.config.multiplier {
            self.config.max_interval
        } else {
            Duration::from_secs_f64(current * self.config.multiplier)
        };
    }
}

/// Picks a value in `[interval * (1 - factor), interval * (1 + factor)]` using `random` in [0, 1).
fn randomize(factor: f64, random: f64, interval: Duration) -> Duration {
    let interval = interval.as_secs_f64();
    let delta = factor * interval;
    let min = interval - delta;
    let max = interval + delta;
    Duration::from_secs_f64((min + random * (max - min)).max(0.0))
}
