// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::ForwarderConfig;
use crate::consolidator::MetricConsolidator;
use crate::constants::{EVENTS_PATH, METRICS_PATH};
use crate::delivery::Delivery;
use crate::encoder::PayloadEncoder;
use crate::errors::CreationError;
use crate::event::Event;
use crate::limiter::ConcurrencyLimiter;
use crate::metric::Metric;
use crate::metric_map::MetricMap;
use crate::proto::{EventV2, RawMessageV2};
use crate::stats::{ForwarderStats, StatsSnapshot, Statser};
use crate::transport::{HttpTransport, Transport};
use reqwest::Url;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Sends consolidated metric batches and events to a remote collector.
///
/// Metrics go through the consolidator and are sent at most `max_requests` at a time. Events are
/// sent as soon as they are dispatched.
pub struct HttpForwarder {
    metrics_url: Url,
    events_url: Url,
    delivery: Delivery,
    limiter: ConcurrencyLimiter,
    consolidator: Arc<MetricConsolidator>,
    consolidated: Mutex<Option<mpsc::Receiver<Vec<MetricMap>>>>,
    next_id: AtomicU64,
    deliveries: TaskTracker,
    events: TaskTracker,
}

impl HttpForwarder {
    pub fn new(config: ForwarderConfig) -> Result<Self, CreationError> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Builds a forwarder sending through `transport` instead of a real HTTP client.
    pub fn with_transport(
        config: ForwarderConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, CreationError> {
        config.validate()?;
        let metrics_url = config.url_for(METRICS_PATH)?;
        let events_url = config.url_for(EVENTS_PATH)?;

        // a single slot, so a slow dispatch loop holds the consolidator back
        let (tx, rx) = mpsc::channel(1);
        let consolidator =
            MetricConsolidator::new(config.consolidator_slots, config.flush_interval, tx);

        let delivery = Delivery::new(
            transport,
            PayloadEncoder::new(config.compress),
            Arc::new(ForwarderStats::new()),
            config.backoff.clone(),
            config.max_request_elapsed_time,
        );

        info!(
            api_endpoint = %config.api_endpoint,
            network = %config.network,
            client_timeout = ?config.client_timeout,
            compress = config.compress,
            enable_http2 = config.enable_http2,
            max_requests = config.max_requests,
            max_request_elapsed_time = ?config.max_request_elapsed_time,
            consolidator_slots = config.consolidator_slots,
            flush_interval = ?config.flush_interval,
            "created http forwarder"
        );

        Ok(Self {
            metrics_url,
            events_url,
            delivery,
            limiter: ConcurrencyLimiter::new(config.max_requests),
            consolidator: Arc::new(consolidator),
            consolidated: Mutex::new(Some(rx)),
            next_id: AtomicU64::new(0),
            deliveries: TaskTracker::new(),
            events: TaskTracker::new(),
        })
    }

    /// The forwarder adds no tags of its own.
    pub fn estimated_tags(&self) -> usize {
        0
    }

    pub fn dispatch_metrics(&self, metrics: Vec<Metric>) {
        self.consolidator.receive_metrics(metrics);
    }

    pub fn dispatch_metric_map(&self, metric_map: MetricMap) {
        self.consolidator.receive_metric_map(metric_map);
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Runs the consolidator and sends what it emits until `cancel` fires.
    ///
    /// Returns once the consolidator stopped, without waiting for in-flight deliveries; see
    /// [`HttpForwarder::wait_for_deliveries`]. Only the first call does anything.
    pub async fn run(&self, cancel: CancellationToken) {
        #[allow(clippy::expect_used)]
        let receiver = self.consolidated.lock().expect("lock poisoned").take();
        let Some(mut consolidated) = receiver else {
            warn!("http forwarder is already running");
            return;
        };

        let consolidator = Arc::clone(&self.consolidator);
        let consolidator_cancel = cancel.clone();
        let consolidator_task =
            tokio::spawn(async move { consolidator.run(consolidator_cancel).await });

        loop {
            let maps = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                maps = consolidated.recv() => match maps {
                    Some(maps) => maps,
                    None => break,
                },
            };

            let merged = MetricMap::merged(maps);
            let Some(slot) = self.limiter.acquire(&cancel).await else {
                break;
            };
            let id = self.next_id();
            let delivery = self.delivery.clone();
            let url = self.metrics_url.clone();
            let task_cancel = cancel.clone();
            self.deliveries.spawn(async move {
                let _slot = slot;
                let message = RawMessageV2::from(&merged);
                delivery.post(&message, &url, id, "metrics", &task_cancel).await;
            });
        }

        // the consolidator only stops on cancel or once this receiver is gone
        drop(consolidated);
        if let Err(e) = consolidator_task.await {
            error!("metric consolidator task failed: {e}");
        }
        debug!("http forwarder stopped");
    }

    /// Waits for every metric delivery started by [`HttpForwarder::run`].
    pub async fn wait_for_deliveries(&self) {
        self.deliveries.close();
        self.deliveries.wait().await;
    }

    /// Sends `event` in the background, bypassing the consolidator and the concurrency limit.
    ///
    /// The delivery is tracked before this returns, so a later [`HttpForwarder::wait_for_events`]
    /// covers it.
    pub fn dispatch_event(&self, cancel: &CancellationToken, event: Event) {
        let id = self.next_id();
        let delivery = self.delivery.clone();
        let url = self.events_url.clone();
        let cancel = cancel.clone();
        self.events.spawn(async move {
            let message = EventV2::from(&event);
            delivery.post(&message, &url, id, "event", &cancel).await;
        });
    }

    /// Waits until every dispatched event delivery finished, including ones dispatched meanwhile.
    pub async fn wait_for_events(&self) {
        self.events.close();
        self.events.wait().await;
    }

    /// Emits the delivery counters on every flush notification until `cancel` fires or the
    /// notifier goes away.
    pub async fn run_metrics(
        &self,
        statser: &dyn Statser,
        mut flushes: mpsc::Receiver<()>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                flush = flushes.recv() => match flush {
                    Some(()) => self.emit_metrics(statser),
                    None => break,
                },
            }
        }
    }

    /// Reports and resets the delivery counters.
    pub fn emit_metrics(&self, statser: &dyn Statser) {
        self.delivery.stats().emit(statser);
    }

    /// Counters since the last emission, without resetting them.
    pub fn stats(&self) -> StatsSnapshot {
        self.delivery.stats().snapshot()
    }

    pub fn in_flight(&self) -> usize {
        self.limiter.in_flight()
    }
}
