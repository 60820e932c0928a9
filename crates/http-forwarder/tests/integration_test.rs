// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use http_forwarder::{
    config::{BackoffConfig, ForwarderConfig},
    event::Event,
    forwarder::HttpForwarder,
    metric::{Metric, MetricType},
    metric_map::MetricMap,
};
use mockito::Server;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;

fn forwarder_config(endpoint: String) -> ForwarderConfig {
    ForwarderConfig {
        api_endpoint: endpoint,
        client_timeout: Duration::from_secs(2),
        max_requests: 4,
        consolidator_slots: 2,
        flush_interval: Duration::from_millis(10),
        backoff: BackoffConfig {
            initial_interval: Duration::from_millis(5),
            randomization_factor: 0.0,
            multiplier: 1.0,
            max_interval: Duration::from_millis(5),
        },
        ..Default::default()
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    let result = timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if result.is_err() {
        panic!("timed out waiting for the forwarder");
    }
}

#[cfg(test)]
#[tokio::test]
async fn forwards_consolidated_metrics_after_retries() {
    let mut server = Server::new_async().await;
    let unavailable = server
        .mock("POST", "/v2/raw")
        .match_header("Content-Type", "application/x-protobuf")
        .match_header("Content-Encoding", "deflate")
        .match_header("User-Agent", "gostatsd (http forwarder)")
        .with_status(503)
        .with_body("overloaded")
        .expect(2)
        .create_async()
        .await;
    let accepted = server
        .mock("POST", "/v2/raw")
        .match_header("Content-Encoding", "deflate")
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    // one tick carries every sample, and cancel lands before the next (empty) tick
    let config = ForwarderConfig {
        flush_interval: Duration::from_millis(500),
        ..forwarder_config(server.url())
    };
    let forwarder = Arc::new(HttpForwarder::new(config).expect("failed to create forwarder"));
    let cancel = CancellationToken::new();
    let run = {
        let forwarder = Arc::clone(&forwarder);
        let cancel = cancel.clone();
        tokio::spawn(async move { forwarder.run(cancel).await })
    };

    let mut map = MetricMap::new();
    map.receive(Metric::new("requests", MetricType::Counter, 3.0, vec!["env:test".to_string()]));
    forwarder.dispatch_metric_map(map);
    forwarder.dispatch_metrics(vec![
        Metric::new("requests", MetricType::Counter, 2.0, vec!["env:test".to_string()]),
        Metric::new("cpu", MetricType::Gauge, 0.5, vec![]),
    ]);

    wait_until(|| forwarder.stats().sent == 1).await;
    let stats = forwarder.stats();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.retried, 2);
    assert_eq!(stats.dropped, 0);

    cancel.cancel();
    run.await.expect("forwarder run panicked");
    forwarder.wait_for_deliveries().await;

    unavailable.assert_async().await;
    accepted.assert_async().await;
}

#[cfg(test)]
#[tokio::test]
async fn sends_events_uncompressed_when_disabled() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v2/event")
        .match_header("Content-Type", "application/x-protobuf")
        .match_header("Content-Encoding", "identity")
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let config = ForwarderConfig {
        compress: false,
        ..forwarder_config(server.url())
    };
    let forwarder = HttpForwarder::new(config).expect("failed to create forwarder");
    let cancel = CancellationToken::new();

    forwarder.dispatch_event(&cancel, Event::new("deploy", "api v2 deployed"));
    forwarder.dispatch_event(&cancel, Event::new("rollback", "api v2 rolled back"));

    timeout(Duration::from_secs(5), forwarder.wait_for_events())
        .await
        .expect("events did not drain");

    assert_eq!(forwarder.stats().sent, 2);
    mock.assert_async().await;
}

#[cfg(test)]
#[tokio::test]
async fn drops_event_once_retry_budget_is_spent() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v2/event")
        .with_status(500)
        .with_body("Internal Server Error")
        .expect_at_least(2)
        .create_async()
        .await;

    let config = ForwarderConfig {
        max_request_elapsed_time: Duration::from_millis(100),
        ..forwarder_config(server.url())
    };
    let forwarder = HttpForwarder::new(config).expect("failed to create forwarder");

    forwarder.dispatch_event(&CancellationToken::new(), Event::new("deploy", "failed"));
    timeout(Duration::from_secs(5), forwarder.wait_for_events())
        .await
        .expect("event delivery did not finish");

    let stats = forwarder.stats();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.sent, 0);
    assert_eq!(stats.dropped, 1);
    assert!(stats.retried >= 1);
    mock.assert_async().await;
}

#[cfg(test)]
#[tokio::test]
async fn cancel_stops_event_retries_without_dropping() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v2/event")
        .with_status(502)
        .create_async()
        .await;

    let config = ForwarderConfig {
        max_request_elapsed_time: Duration::from_secs(60),
        backoff: BackoffConfig {
            initial_interval: Duration::from_secs(30),
            randomization_factor: 0.0,
            multiplier: 1.0,
            max_interval: Duration::from_secs(30),
        },
        ..forwarder_config(server.url())
    };
    let forwarder = HttpForwarder::new(config).expect("failed to create forwarder");
    let cancel = CancellationToken::new();

    forwarder.dispatch_event(&cancel, Event::new("deploy", "stuck"));
    wait_until(|| forwarder.stats().retried == 1).await;
    cancel.cancel();

    timeout(Duration::from_secs(5), forwarder.wait_for_events())
        .await
        .expect("cancel should interrupt the backoff");

    let stats = forwarder.stats();
    assert_eq!(stats.retried, 1);
    assert_eq!(stats.dropped, 0);
    assert_eq!(stats.sent, 0);
}
