//! Real adapters against a local HTTP server: status and body classification
//! through the shared transport, and what the retry coordinator makes of it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use depthx_rs::config::{VenueConfig, VenueKind};
use depthx_rs::error::FetchError;
use depthx_rs::market_data::adapters::binance::BinanceAdapter;
use depthx_rs::market_data::adapters::bybit::BybitAdapter;
use depthx_rs::market_data::adapters::okx::OkxAdapter;
use depthx_rs::market_data::adapters::VenueAdapter;
use depthx_rs::market_data::types::SymbolDescriptor;
use depthx_rs::retry::{with_retry, FetchFailure, Outcome, RetryPolicy};

const DEPTH_OK: &str = r#"{"lastUpdateId":1,"E":1700000000001,"T":1700000000000,
"bids":[["100.0","2.0"],["99.5","1.0"]],"asks":[["100.5","3.0"]]}"#;

fn config(kind: VenueKind, server: &MockServer) -> VenueConfig {
    VenueConfig { base_url: Some(server.uri()), timeout_ms: 500, ..VenueConfig::new("v", kind) }
}

fn btc(native: &str) -> SymbolDescriptor {
    SymbolDescriptor { canonical: "BTC/USDT".parse().unwrap(), native: native.to_string(), contract_size: 1.0 }
}

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        backoff_factor: 2.0,
        max_delay: Duration::from_millis(20),
        jitter: false,
    }
}

async fn depth_with_retry(adapter: &dyn VenueAdapter, symbol: &SymbolDescriptor) -> (Outcome<f64>, u32) {
    let calls = AtomicU32::new(0);
    let outcome = with_retry(&policy(), FetchError::disposition, |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move { adapter.fetch_depth(symbol, 20).await.map(|s| s.best_bid().map_or(0.0, |l| l.price)) }
    })
    .await;
    (outcome, calls.load(Ordering::SeqCst))
}

fn binance_depth(status: u16, body: &str) -> Mock {
    Mock::given(method("GET"))
        .and(path("/fapi/v1/depth"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .named(format!("depth {status}"))
}

#[tokio::test]
async fn http_429_is_rate_limited_and_retried_to_exhaustion() {
    let server = MockServer::start().await;
    binance_depth(429, "Too many requests").mount(&server).await;
    let adapter = BinanceAdapter::new(&config(VenueKind::Binance, &server)).unwrap();

    let err = adapter.fetch_depth(&btc("BTCUSDT"), 20).await.unwrap_err();
    assert!(matches!(err, FetchError::VenueRateLimited { .. }), "{err:?}");

    server.reset().await;
    binance_depth(429, "Too many requests").expect(3).mount(&server).await;
    let (outcome, calls) = depth_with_retry(&adapter, &btc("BTCUSDT")).await;
    assert_eq!(calls, 3);
    match outcome {
        Outcome::RetryableFailure(FetchFailure { error: FetchError::VenueRateLimited { .. }, attempts: 3 }) => {}
        other => panic!("expected exhausted rate limiting, got {other:?}"),
    }
}

#[tokio::test]
async fn http_503_is_unavailable_and_recovers_on_retry() {
    let server = MockServer::start().await;
    binance_depth(503, "maintenance").up_to_n_times(1).mount(&server).await;
    binance_depth(200, DEPTH_OK).mount(&server).await;
    let adapter = BinanceAdapter::new(&config(VenueKind::Binance, &server)).unwrap();

    let err = adapter.fetch_depth(&btc("BTCUSDT"), 20).await.unwrap_err();
    assert!(matches!(err, FetchError::VenueUnavailable { .. }), "{err:?}");

    server.reset().await;
    binance_depth(503, "maintenance").up_to_n_times(1).mount(&server).await;
    binance_depth(200, DEPTH_OK).mount(&server).await;
    let (outcome, calls) = depth_with_retry(&adapter, &btc("BTCUSDT")).await;
    assert_eq!(calls, 2);
    assert_eq!(outcome.success(), Some(&100.0));
}

#[tokio::test]
async fn http_404_is_terminal_after_one_attempt() {
    let server = MockServer::start().await;
    binance_depth(404, r#"{"code":-1121,"msg":"Invalid symbol."}"#).mount(&server).await;
    let adapter = BinanceAdapter::new(&config(VenueKind::Binance, &server)).unwrap();

    let (outcome, calls) = depth_with_retry(&adapter, &btc("NOPEUSDT")).await;
    assert_eq!(calls, 1);
    match outcome {
        Outcome::TerminalFailure(FetchFailure { error: FetchError::VenueRejected { status: 404, reason }, attempts: 1 }) => {
            assert!(reason.contains("Invalid symbol"));
        }
        other => panic!("expected a terminal rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_terminal_after_one_attempt() {
    let server = MockServer::start().await;
    binance_depth(200, r#"{"bids": "not levels"}"#).expect(1).mount(&server).await;
    let adapter = BinanceAdapter::new(&config(VenueKind::Binance, &server)).unwrap();

    let (outcome, calls) = depth_with_retry(&adapter, &btc("BTCUSDT")).await;
    assert_eq!(calls, 1);
    assert!(matches!(
        outcome,
        Outcome::TerminalFailure(FetchFailure { error: FetchError::VenueMalformedResponse { .. }, attempts: 1 })
    ));
}

#[tokio::test]
async fn slow_response_times_out_as_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fapi/v1/depth"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DEPTH_OK).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    let adapter = BinanceAdapter::new(&config(VenueKind::Binance, &server)).unwrap();

    let err = adapter.fetch_depth(&btc("BTCUSDT"), 20).await.unwrap_err();
    match err {
        FetchError::VenueUnavailable { reason } => assert!(reason.contains("timed out"), "{reason}"),
        other => panic!("expected a transport timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn envelope_rate_limit_inside_http_200() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v5/market/books"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"code":"50011","msg":"Too Many Requests","data":[]}"#),
        )
        .mount(&server)
        .await;
    let adapter = OkxAdapter::new(&config(VenueKind::Okx, &server)).unwrap();

    let (outcome, calls) = depth_with_retry(&adapter, &btc("BTC-USDT-SWAP")).await;
    assert_eq!(calls, 3);
    assert!(matches!(
        outcome,
        Outcome::RetryableFailure(FetchFailure { error: FetchError::VenueRateLimited { .. }, .. })
    ));
}

#[tokio::test]
async fn bybit_listing_follows_the_cursor() {
    let server = MockServer::start().await;
    // More specific mock first: it wins for the cursor request.
    Mock::given(method("GET"))
        .and(path("/v5/market/instruments-info"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"retCode":0,"retMsg":"OK","result":{"list":[
            {"symbol":"SOLUSDT","contractType":"LinearPerpetual","status":"Trading"}],"nextPageCursor":""}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v5/market/instruments-info"))
        .and(query_param("category", "linear"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"retCode":0,"retMsg":"OK","result":{"list":[
            {"symbol":"BTCUSDT","contractType":"LinearPerpetual","status":"Trading"},
            {"symbol":"ETHUSDT","contractType":"LinearPerpetual","status":"Closed"}],"nextPageCursor":"page2"}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    let adapter = BybitAdapter::new(&config(VenueKind::Bybit, &server)).unwrap();

    let natives: Vec<String> = adapter.list_symbols().await.unwrap().into_iter().map(|s| s.native).collect();
    assert_eq!(natives, vec!["BTCUSDT", "SOLUSDT"]);
}
