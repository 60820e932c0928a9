// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sends one payload with retries: encode once, then attempt until success, cancellation, or
//! the elapsed time budget runs out.

use crate::backoff::ExponentialBackoff;
use crate::config::BackoffConfig;
use crate::encoder::PayloadEncoder;
use crate::stats::ForwarderStats;
use crate::transport::Transport;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

/// How a delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The payload could not be built; nothing was sent.
    Invalid,
    Sent,
    /// Every attempt failed and the elapsed time budget is spent.
    Dropped,
    /// Cancellation fired before the delivery reached a final state.
    Cancelled,
}

#[derive(Clone)]
pub struct Delivery {
    transport: Arc<dyn Transport>,
    encoder: PayloadEncoder,
    stats: Arc<ForwarderStats>,
    backoff: BackoffConfig,
    max_elapsed_time: Duration,
}

impl Delivery {
    pub fn new(
        transport: Arc<dyn Transport>,
        encoder: PayloadEncoder,
        stats: Arc<ForwarderStats>,
        backoff: BackoffConfig,
        max_elapsed_time: Duration,
    ) -> Self {
        Self {
            transport,
            encoder,
            stats,
            backoff,
            max_elapsed_time,
        }
    }

    pub fn stats(&self) -> &Arc<ForwarderStats> {
        &self.stats
    }

    /// Delivers `message` to `url`. `kind` and `id` only label the logs.
    pub async fn post<M: prost::Message>(
        &self,
        message: &M,
        url: &Url,
        id: u64,
        kind: &'static str,
        cancel: &CancellationToken,
    ) -> DeliveryOutcome {
        let span = info_span!("delivery", id, kind);
        let payload = match self.encoder.encode(message) {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.inc_invalid();
                span.in_scope(|| error!("failed to create request: {e}"));
                return DeliveryOutcome::Invalid;
            }
        };
        self.stats.inc_created();

        async move {
            let mut backoff = ExponentialBackoff::new(&self.backoff, self.max_elapsed_time);
            loop {
                let err = match self.transport.post(url, &payload, cancel).await {
                    Ok(()) => {
                        self.stats.inc_sent();
                        debug!(bytes = payload.body.len(), "request sent");
                        return DeliveryOutcome::Sent;
                    }
                    Err(e) if e.is_cancelled() => {
                        debug!("request cancelled");
                        return DeliveryOutcome::Cancelled;
                    }
                    Err(e) => e,
                };

                let Some(wait) = backoff.next_backoff() else {
                    self.stats.inc_dropped();
                    info!(elapsed = ?backoff.elapsed(), "failed to send, giving up: {err}");
                    return DeliveryOutcome::Dropped;
                };

                self.stats.inc_retried();
                debug!(?wait, "failed to send, retrying: {err}");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("cancelled while backing off");
                        return DeliveryOutcome::Cancelled;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }
        .instrument(span)
        .await
    }
}
