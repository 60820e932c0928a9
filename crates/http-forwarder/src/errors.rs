// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Rejected forwarder configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api-endpoint is required")]
    MissingEndpoint,
    #[error("api-endpoint is not a valid url: {0}")]
    InvalidEndpoint(String),
    #[error("network must be one of tcp, tcp4, tcp6; got {0}")]
    InvalidNetwork(String),
    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

/// Failure to build a forwarder.
#[derive(Debug, thiserror::Error)]
pub enum CreationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("unable to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A payload which could not be built. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("unable to serialize message: {0}")]
    Serialize(#[from] prost::EncodeError),
    #[error("unable to compress message: {0}")]
    Compress(#[from] std::io::Error),
}

/// A single failed send attempt.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("error POSTing: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("received bad status code {status}")]
    Status { status: StatusCode, body: String },
    #[error("request cancelled")]
    Cancelled,
}

impl SendError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SendError::Cancelled)
    }
}
