// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

pub const DEFAULT_API_ENDPOINT: &str = "";
pub const DEFAULT_NETWORK: &str = "tcp";
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_COMPRESS: bool = true;
// HTTP/2 connection reuse has been unreliable behind some load balancers
pub const DEFAULT_ENABLE_HTTP2: bool = false;
pub const DEFAULT_MAX_REQUESTS: usize = 1000;
pub const DEFAULT_MAX_REQUEST_ELAPSED_TIME: Duration = Duration::from_secs(30);
pub const DEFAULT_CONSOLIDATOR_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

pub const METRICS_PATH: &str = "/v2/raw";
pub const EVENTS_PATH: &str = "/v2/event";

pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";
pub const USER_AGENT: &str = "gostatsd (http forwarder)";

/// Upper bound on how much of a failed response body is kept for logging.
pub const MAX_ERROR_BODY_BYTES: usize = 512;

pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
pub const TCP_KEEP_ALIVE: Duration = Duration::from_secs(30);
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const POOL_MAX_IDLE_PER_HOST: usize = 50;

pub const STAT_INVALID: &str = "http.forwarder.invalid";
pub const STAT_CREATED: &str = "http.forwarder.created";
pub const STAT_SENT: &str = "http.forwarder.sent";
pub const STAT_RETRIED: &str = "http.forwarder.retried";
pub const STAT_DROPPED: &str = "http.forwarder.dropped";
