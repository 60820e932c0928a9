// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{
    DEFAULT_API_ENDPOINT, DEFAULT_CLIENT_TIMEOUT, DEFAULT_COMPRESS,
    DEFAULT_CONSOLIDATOR_FLUSH_INTERVAL, DEFAULT_ENABLE_HTTP2, DEFAULT_MAX_REQUESTS,
    DEFAULT_MAX_REQUEST_ELAPSED_TIME, DEFAULT_NETWORK,
};
use crate::errors::ConfigError;
use reqwest::Url;
use std::env;
use std::time::Duration;

/// Address family used to reach the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Network {
    #[display("tcp")]
    Tcp,
    #[display("tcp4")]
    Tcp4,
    #[display("tcp6")]
    Tcp6,
}

impl Network {
    pub fn parse(network: &str) -> Result<Self, ConfigError> {
        match network {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            other => Err(ConfigError::InvalidNetwork(other.to_string())),
        }
    }
}

/// Tuning for the exponential backoff applied between send attempts.
///
/// The maximum elapsed time lives on [`ForwarderConfig`] since it is user facing.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub initial_interval: Duration,
    /// Each interval is drawn from `[interval * (1 - f), interval * (1 + f)]`.
    pub randomization_factor: f64,
    pub multiplier: f64,
    pub max_interval: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            randomization_factor: 0.5,
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
        }
    }
}

/// Configuration for the HTTP forwarder
#[derive(Debug, Clone, PartialEq)]
pub struct ForwarderConfig {
    /// Base URL of the collector, e.g. "https://statsd.example.com"
    pub api_endpoint: String,
    /// One of "tcp", "tcp4" or "tcp6"
    pub network: String,
    /// Timeout for a single request, including reading the response
    pub client_timeout: Duration,
    /// Deflate payloads before sending
    pub compress: bool,
    pub enable_http2: bool,
    /// Maximum number of metric batches in flight at once
    pub max_requests: usize,
    /// Give up on a delivery once this much time passed since its first attempt
    pub max_request_elapsed_time: Duration,
    /// Number of partial maps the consolidator merges into
    pub consolidator_slots: usize,
    pub flush_interval: Duration,
    pub backoff: BackoffConfig,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            network: DEFAULT_NETWORK.to_string(),
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
            compress: DEFAULT_COMPRESS,
            enable_http2: DEFAULT_ENABLE_HTTP2,
            max_requests: DEFAULT_MAX_REQUESTS,
            max_request_elapsed_time: DEFAULT_MAX_REQUEST_ELAPSED_TIME,
            consolidator_slots: default_consolidator_slots(),
            flush_interval: DEFAULT_CONSOLIDATOR_FLUSH_INTERVAL,
            backoff: BackoffConfig::default(),
        }
    }
}

/// One slot per parser, and parsers default to one per CPU.
fn default_consolidator_slots() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.trim().parse::<T>().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().to_lowercase().parse::<bool>().ok())
}

impl ForwarderConfig {
    /// Create configuration from `STATSD_HTTP_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            api_endpoint: env::var("STATSD_HTTP_API_ENDPOINT").unwrap_or(defaults.api_endpoint),
            network: env::var("STATSD_HTTP_NETWORK")
                .map(|val| val.to_lowercase())
                .unwrap_or(defaults.network),
            client_timeout: env_parse("STATSD_HTTP_CLIENT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.client_timeout),
            compress: env_bool("STATSD_HTTP_COMPRESS").unwrap_or(defaults.compress),
            enable_http2: env_bool("STATSD_HTTP_ENABLE_HTTP2").unwrap_or(defaults.enable_http2),
            max_requests: env_parse("STATSD_HTTP_MAX_REQUESTS").unwrap_or(defaults.max_requests),
            max_request_elapsed_time: env_parse("STATSD_HTTP_MAX_REQUEST_ELAPSED_TIME_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_request_elapsed_time),
            consolidator_slots: env_parse("STATSD_HTTP_CONSOLIDATOR_SLOTS")
                .unwrap_or(defaults.consolidator_slots),
            flush_interval: env_parse("STATSD_HTTP_FLUSH_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.flush_interval),
            backoff: defaults.backoff,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;
        Network::parse(&self.network)?;
        if self.consolidator_slots == 0 {
            return Err(ConfigError::NotPositive("consolidator-slots"));
        }
        if self.max_requests == 0 {
            return Err(ConfigError::NotPositive("max-requests"));
        }
        if self.client_timeout.is_zero() {
            return Err(ConfigError::NotPositive("client-timeout"));
        }
        if self.max_request_elapsed_time.is_zero() {
            return Err(ConfigError::NotPositive("max-request-elapsed-time"));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::NotPositive("flush-interval"));
        }
        Ok(())
    }

    /// Full URL for a collector path, e.g. `/v2/raw`.
    pub fn url_for(&self, path: &str) -> Result<Url, ConfigError> {
        let base = self.endpoint_url()?;
        let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| ConfigError::InvalidEndpoint(e.to_string()))
    }

    fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let endpoint = self.api_endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint(e.to_string()))
    }
}
