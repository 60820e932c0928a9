// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::{ForwarderConfig, Network};
use crate::constants::{
    CONTENT_TYPE_PROTOBUF, DIAL_TIMEOUT, MAX_ERROR_BODY_BYTES, POOL_IDLE_TIMEOUT,
    POOL_MAX_IDLE_PER_HOST, TCP_KEEP_ALIVE, USER_AGENT,
};
use crate::encoder::EncodedPayload;
use crate::errors::{CreationError, SendError};
use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT as USER_AGENT_HEADER};
use reqwest::{Client, Response, Url};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Performs a single POST of an encoded payload.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `Ok` only for a 2xx response. Returns [`SendError::Cancelled`] if `cancel` fires first.
    async fn post(
        &self,
        url: &Url,
        payload: &EncodedPayload,
        cancel: &CancellationToken,
    ) -> Result<(), SendError>;
}

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &ForwarderConfig) -> Result<Self, CreationError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }
}

/// Builds the shared client. One client is kept for the forwarder's lifetime so connections are reused.
pub fn build_client(config: &ForwarderConfig) -> Result<Client, CreationError> {
    let network = Network::parse(&config.network)?;
    let mut builder = Client::builder()
        .use_rustls_tls()
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .timeout(config.client_timeout)
        .connect_timeout(DIAL_TIMEOUT)
        .tcp_keepalive(TCP_KEEP_ALIVE)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST);

    if !config.enable_http2 {
        builder = builder.http1_only();
    }

    builder = match network {
        Network::Tcp => builder,
        Network::Tcp4 => builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        Network::Tcp6 => builder.local_address(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
    };

    Ok(builder.build()?)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &Url,
        payload: &EncodedPayload,
        cancel: &CancellationToken,
    ) -> Result<(), SendError> {
        let request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, CONTENT_TYPE_PROTOBUF)
            .header(CONTENT_ENCODING, payload.encoding.to_string())
            .header(USER_AGENT_HEADER, USER_AGENT)
            .body(payload.body.clone());

        let attempt = async {
            let response = request.send().await?;
            check_response(response).await
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SendError::Cancelled),
            result = attempt => result,
        }
    }
}

/// Reads the whole body so the connection can be reused, keeping a prefix for failures.
async fn check_response(mut response: Response) -> Result<(), SendError> {
    let status = response.status();
    let success = status.is_success();
    let mut prefix = Vec::new();

    while let Some(chunk) = response.chunk().await? {
        if !success && prefix.len() < MAX_ERROR_BODY_BYTES {
            let take = (MAX_ERROR_BODY_BYTES - prefix.len()).min(chunk.len());
            prefix.extend_from_slice(&chunk[..take]);
        }
    }

    if success {
        return Ok(());
    }

    let body = String::from_utf8_lossy(&prefix).into_owned();
    info!(status = status.as_u16(), body = %body, "failed request");
    Err(SendError::Status { status, body })
}
