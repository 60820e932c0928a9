// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwards consolidated statsd metrics and events to a remote collector over HTTP.
//!
//! Metric batches flow through a [`consolidator::MetricConsolidator`] which merges concurrently
//! received batches and emits one merged map per flush interval. Each merged map is sent by its
//! own delivery task, gated by a [`limiter::ConcurrencyLimiter`] so at most `max_requests`
//! deliveries are in flight. Events skip the consolidator and the limiter and are tracked
//! individually so shutdown can wait for them.
//!
//! Payloads are protobuf, optionally deflate compressed, and are retried with exponential
//! backoff until a maximum elapsed time is reached.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod backoff;
pub mod config;
pub mod consolidator;
pub mod constants;
pub mod delivery;
pub mod encoder;
pub mod errors;
pub mod event;
pub mod forwarder;
pub mod limiter;
pub mod metric;
pub mod metric_map;
pub mod proto;
pub mod stats;
pub mod transport;
