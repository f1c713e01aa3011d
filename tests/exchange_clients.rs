//! HTTP-level client tests against a mock exchange API.

use airdrop_runner::exchanges::{
    BithumbClient, ExchangeClient, ExchangeError, OrderSide, UpbitClient,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_bithumb_balance_request_is_signed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/info/balance"))
        .and(header_exists("Api-Key"))
        .and(header_exists("Api-Sign"))
        .and(header_exists("Api-Nonce"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "0000",
            "data": {
                "available_btc": "0.5",
                "in_use_btc": "0.1"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = BithumbClient::new("key", "secret").with_base_url(&server.uri());
    let balance = client.get_balance("BTC").await.unwrap();

    assert_eq!(balance.currency, "BTC");
    assert_eq!(balance.free, 0.5);
    assert_eq!(balance.locked, 0.1);
}

#[tokio::test]
async fn test_bithumb_invalid_key_maps_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/info/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "5300",
            "message": "Invalid Apikey"
        })))
        .mount(&server)
        .await;

    let client = BithumbClient::new("bad", "bad").with_base_url(&server.uri());
    let err = client.get_balance("BTC").await.unwrap_err();
    assert!(matches!(err, ExchangeError::Auth(_)));
}

#[tokio::test]
async fn test_bithumb_5xx_maps_to_maintenance() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/info/balance"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = BithumbClient::new("key", "secret").with_base_url(&server.uri());
    let err = client.get_balance("BTC").await.unwrap_err();
    assert!(matches!(err, ExchangeError::Maintenance(_)));
}

#[tokio::test]
async fn test_bithumb_buy_converts_krw_to_units() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public/ticker/BTC_KRW"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "0000",
            "data": { "closing_price": "50000000" }
        })))
        .mount(&server)
        .await;
    // 10000 KRW at 50M KRW/BTC is 0.0002 BTC
    Mock::given(method("POST"))
        .and(path("/trade/market_buy"))
        .and(body_string_contains("units=0.00020000"))
        .and(body_string_contains("order_currency=BTC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "0000",
            "order_id": "C0101000000001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = BithumbClient::new("key", "secret").with_base_url(&server.uri());
    let receipt = client.place_market_buy("BTC", 10_000.0).await.unwrap();

    assert_eq!(receipt.order_id, "C0101000000001");
    assert_eq!(receipt.side, OrderSide::Buy);
    assert_eq!(receipt.amount, 10_000.0);
}

#[tokio::test]
async fn test_bithumb_amount_below_minimum_is_rejected_locally() {
    // no mocks mounted: the check happens before any request
    let server = MockServer::start().await;
    let client = BithumbClient::new("key", "secret").with_base_url(&server.uri());

    let err = client.place_market_buy("BTC", 1_000.0).await.unwrap_err();
    assert!(matches!(err, ExchangeError::MinimumAmount(_)));
}

#[tokio::test]
async fn test_upbit_balances_use_bearer_jwt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/accounts"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "currency": "KRW", "balance": "100000.0", "locked": "0.0" },
            { "currency": "XRP", "balance": "10.5", "locked": "1.5" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = UpbitClient::new("access", "secret").with_base_url(&server.uri());
    let balances = client.get_all_balances().await.unwrap();

    assert_eq!(balances.len(), 2);
    assert_eq!(balances["KRW"].free, 100_000.0);
    assert_eq!(balances["XRP"].total(), 12.0);
}

#[tokio::test]
async fn test_upbit_insufficient_funds_maps_to_balance_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "name": "insufficient_funds_bid",
                "message": "주문가능한 금액(KRW)이 부족합니다."
            }
        })))
        .mount(&server)
        .await;

    let client = UpbitClient::new("access", "secret").with_base_url(&server.uri());
    let err = client.place_market_buy("BTC", 10_000.0).await.unwrap_err();
    assert!(matches!(err, ExchangeError::InsufficientBalance(_)));
}

#[tokio::test]
async fn test_upbit_market_buy_spends_quote_amount() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .and(body_string_contains("\"market\":\"KRW-BTC\""))
        .and(body_string_contains("\"ord_type\":\"price\""))
        .and(body_string_contains("\"price\":\"10000\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "uuid": "9ca023a5-851b-4fec-9f0a-48cd83c2eaae",
            "state": "wait"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = UpbitClient::new("access", "secret").with_base_url(&server.uri());
    let receipt = client.place_market_buy("BTC", 10_000.0).await.unwrap();

    assert_eq!(receipt.order_id, "9ca023a5-851b-4fec-9f0a-48cd83c2eaae");
    assert_eq!(receipt.side, OrderSide::Buy);
}

#[tokio::test]
async fn test_upbit_last_price_reads_ticker() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/ticker"))
        .and(query_param("markets", "KRW-BTC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "market": "KRW-BTC", "trade_price": 50000000.0 }
        ])))
        .mount(&server)
        .await;

    let client = UpbitClient::new("access", "secret").with_base_url(&server.uri());
    let price = client.get_last_price("BTC").await.unwrap();
    assert_eq!(price, 50_000_000.0);
}
