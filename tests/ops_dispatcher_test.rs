use genie_relay::config::Responder;
use genie_relay::{hash_alias, AlertDispatcher, AlertGateway, AlertMessage, GatewayConfig, RateLimiterConfig};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn config() -> GatewayConfig {
    GatewayConfig::new("test-key", vec![Responder::team("ops")])
}

#[tokio::test]
async fn test_limited_calls_are_spaced() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/v2/alerts");
            then.status(202).json_body(json!({ "requestId": "req-1" }));
        })
        .await;
    let gateway = Arc::new(AlertGateway::with_base_url(&server.base_url()).unwrap());
    let dispatcher = AlertDispatcher::with_limiter(
        gateway,
        RateLimiterConfig {
            max_concurrent: 1,
            min_time: Duration::from_millis(200),
            reservoir_per_minute: None,
        },
    );
    let config = config();
    let messages: Vec<_> = (0..3)
        .map(|i| AlertMessage::new(format!("breach {}", i), format!("breach-{}", i)))
        .collect();

    let started = Instant::now();
    let deliveries = futures::future::join_all(messages.iter().map(|m| dispatcher.create(m, &config))).await;

    assert!(deliveries.iter().all(|d| d.is_delivered()));
    assert!(started.elapsed() >= Duration::from_millis(400));
    create.assert_hits_async(3).await;
}

#[tokio::test]
async fn test_reconcile_creates_then_closes() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/v2/alerts");
            then.status(202).json_body(json!({ "requestId": "req-7" }));
        })
        .await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/alerts");
            then.status(200).json_body(json!({ "data": [] }));
        })
        .await;
    let close = server
        .mock_async(|when, then| {
            when.method(POST).path("/v2/alerts/req-7/close");
            then.status(202);
        })
        .await;
    let gateway = Arc::new(AlertGateway::with_base_url(&server.base_url()).unwrap());
    let dispatcher = AlertDispatcher::with_limiter(
        Arc::clone(&gateway),
        RateLimiterConfig {
            max_concurrent: 1,
            min_time: Duration::from_millis(10),
            reservoir_per_minute: None,
        },
    );
    let config = config();
    let message = AlertMessage::new("Beacon stale", "beacon-stale");

    // * Warm the cache first so the create is recorded locally
    gateway.ensure_cache(&config, false).await;
    dispatcher.reconcile(true, &message, &config).await;
    assert_eq!(gateway.cache().matching(&hash_alias("beacon-stale")).len(), 1);

    dispatcher.reconcile(false, &message, &config).await;

    create.assert_hits_async(1).await;
    list.assert_hits_async(1).await;
    close.assert_hits_async(1).await;
    assert!(gateway.cache().is_empty());
}
