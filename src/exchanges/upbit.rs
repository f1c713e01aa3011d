//! Upbit exchange client
//!
//! Private endpoints authenticate with a JWT (HS256) carrying the access key,
//! a UUID nonce and, when parameters are present, a SHA-512 hash of the
//! urlencoded query string.

use crate::exchanges::{
    traits::{Balance, ExchangeClient, ExchangeError, OrderReceipt, OrderSide},
    transport_error, Exchange,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine as _};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_URL: &str = "https://api.upbit.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_ORDER_KRW: f64 = 5_000.0;
const BALANCE_POLL_ATTEMPTS: u32 = 3;
const BALANCE_POLL_DELAY: Duration = Duration::from_secs(2);

type HmacSha256 = Hmac<Sha256>;

/// REST client for one Upbit account
pub struct UpbitClient {
    access_key: String,
    secret_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl UpbitClient {
    /// Create a client for the given API credentials
    pub fn new(access_key: &str, secret_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            access_key: access_key.trim_matches(|c| c == '\'' || c == '"').to_string(),
            secret_key: secret_key.trim_matches(|c| c == '\'' || c == '"').to_string(),
            base_url: API_URL.to_string(),
            http,
        }
    }

    /// Override the API base URL (HTTP-mock tests)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Build the authorization JWT, hashing `query` into the payload when present
    fn auth_token(&self, query: Option<&str>) -> String {
        let header = json!({"alg": "HS256", "typ": "JWT"});
        let mut payload = json!({
            "access_key": self.access_key,
            "nonce": uuid::Uuid::new_v4().to_string(),
        });
        if let Some(query) = query {
            let mut hasher = Sha512::new();
            hasher.update(query.as_bytes());
            payload["query_hash"] = json!(hex::encode(hasher.finalize()));
            payload["query_hash_alg"] = json!("SHA512");
        }

        let signing_input = format!(
            "{}.{}",
            BASE64_URL.encode(header.to_string()),
            BASE64_URL.encode(payload.to_string())
        );

        let mut mac = match HmacSha256::new_from_slice(self.secret_key.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(signing_input.as_bytes());
        let signature = BASE64_URL.encode(mac.finalize().into_bytes());

        format!("Bearer {}.{}", signing_input, signature)
    }

    async fn private_get(&self, path: &str, query: Option<&str>) -> Result<Value, ExchangeError> {
        let url = match query {
            Some(q) => format!("{}{}?{}", self.base_url, path, q),
            None => format!("{}{}", self.base_url, path),
        };
        debug!(path, "upbit private request");

        let response = self
            .http
            .get(&url)
            .header("Authorization", self.auth_token(query))
            .send()
            .await
            .map_err(transport_error)?;

        read_response(response).await
    }

    async fn private_post(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ExchangeError> {
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();

        let body: serde_json::Map<String, Value> = params
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
            .collect();

        let url = format!("{}{}", self.base_url, path);
        debug!(path, "upbit private request");

        let response = self
            .http
            .post(&url)
            .header("Authorization", self.auth_token(Some(&query)))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        read_response(response).await
    }

    fn market_code(symbol: &str) -> String {
        format!("KRW-{}", symbol.to_uppercase())
    }
}

#[async_trait]
impl ExchangeClient for UpbitClient {
    fn exchange(&self) -> Exchange {
        Exchange::Upbit
    }

    fn min_order_quote(&self) -> f64 {
        MIN_ORDER_KRW
    }

    async fn get_balance(&self, currency: &str) -> Result<Balance, ExchangeError> {
        let balances = self.get_all_balances().await?;
        Ok(balances
            .get(&currency.to_uppercase())
            .cloned()
            .unwrap_or(Balance {
                currency: currency.to_uppercase(),
                free: 0.0,
                locked: 0.0,
            }))
    }

    async fn get_all_balances(&self) -> Result<HashMap<String, Balance>, ExchangeError> {
        let body = self.private_get("/v1/accounts", None).await?;

        let mut balances = HashMap::new();
        if let Some(entries) = body.as_array() {
            for entry in entries {
                let currency = entry
                    .get("currency")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_uppercase();
                if currency.is_empty() {
                    continue;
                }
                let balance = Balance {
                    currency: currency.clone(),
                    free: str_f64(entry, "balance"),
                    locked: str_f64(entry, "locked"),
                };
                if balance.total() > 0.0 {
                    balances.insert(currency, balance);
                }
            }
        }
        Ok(balances)
    }

    async fn place_market_buy(
        &self,
        symbol: &str,
        quote_amount: f64,
    ) -> Result<OrderReceipt, ExchangeError> {
        if quote_amount < MIN_ORDER_KRW {
            return Err(ExchangeError::MinimumAmount(format!(
                "{:.0} KRW below upbit minimum {:.0} KRW",
                quote_amount, MIN_ORDER_KRW
            )));
        }

        // ord_type "price" is Upbit's quote-amount market buy
        let body = self
            .private_post(
                "/v1/orders",
                &[
                    ("market", Self::market_code(symbol)),
                    ("side", "bid".to_string()),
                    ("ord_type", "price".to_string()),
                    ("price", format!("{:.0}", quote_amount)),
                ],
            )
            .await?;

        let order_id = body
            .get("uuid")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        info!(symbol, order_id, quote_amount, "upbit market buy accepted");

        Ok(OrderReceipt {
            order_id,
            symbol: symbol.to_uppercase(),
            side: OrderSide::Buy,
            amount: quote_amount,
            timestamp: chrono::Utc::now().timestamp(),
        })
    }

    async fn place_market_sell(
        &self,
        symbol: &str,
        base_quantity: f64,
    ) -> Result<OrderReceipt, ExchangeError> {
        let body = self
            .private_post(
                "/v1/orders",
                &[
                    ("market", Self::market_code(symbol)),
                    ("side", "ask".to_string()),
                    ("ord_type", "market".to_string()),
                    ("volume", format!("{:.8}", base_quantity)),
                ],
            )
            .await?;

        let order_id = body
            .get("uuid")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        info!(symbol, order_id, base_quantity, "upbit market sell accepted");

        Ok(OrderReceipt {
            order_id,
            symbol: symbol.to_uppercase(),
            side: OrderSide::Sell,
            amount: base_quantity,
            timestamp: chrono::Utc::now().timestamp(),
        })
    }

    async fn get_filled_quantity(
        &self,
        symbol: &str,
        _receipt: &OrderReceipt,
    ) -> Result<f64, ExchangeError> {
        for attempt in 1..=BALANCE_POLL_ATTEMPTS {
            let balance = self.get_balance(symbol).await?;
            if balance.free > 0.0 {
                return Ok(balance.free);
            }
            if attempt < BALANCE_POLL_ATTEMPTS {
                warn!(symbol, attempt, "balance not settled yet, polling again");
                tokio::time::sleep(BALANCE_POLL_DELAY).await;
            }
        }

        Err(ExchangeError::Timeout(format!(
            "{} balance not credited after {} polls",
            symbol, BALANCE_POLL_ATTEMPTS
        )))
    }

    async fn get_last_price(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let url = format!(
            "{}/v1/ticker?markets={}",
            self.base_url,
            Self::market_code(symbol)
        );
        let response = self.http.get(&url).send().await.map_err(transport_error)?;
        let body = read_response(response).await?;

        let price = body
            .as_array()
            .and_then(|entries| entries.first())
            .map(|entry| str_f64(entry, "trade_price"))
            .unwrap_or(0.0);

        if price <= 0.0 {
            return Err(ExchangeError::Network(format!(
                "no trade price for {}",
                symbol
            )));
        }
        Ok(price)
    }
}

/// Decode a response body, mapping Upbit's error envelope onto the taxonomy
async fn read_response(response: reqwest::Response) -> Result<Value, ExchangeError> {
    let status = response.status();
    if status.is_server_error() {
        return Err(ExchangeError::Maintenance(format!(
            "upbit returned {}",
            status
        )));
    }

    let body: Value = response.json().await.map_err(transport_error)?;

    if let Some(error) = body.get("error") {
        let name = error
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message")
            .to_string();
        return Err(map_error_name(&name, message, status));
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ExchangeError::Auth("upbit returned 401".to_string()));
    }

    Ok(body)
}

fn map_error_name(
    name: &str,
    message: String,
    status: reqwest::StatusCode,
) -> ExchangeError {
    match name {
        "insufficient_funds_bid" | "insufficient_funds_ask" => {
            ExchangeError::InsufficientBalance(message)
        }
        "under_min_total_bid" | "under_min_total_ask" => ExchangeError::MinimumAmount(message),
        "invalid_access_key" | "jwt_verification" | "expired_access_key"
        | "no_authorization_ip" => ExchangeError::Auth(message),
        "server_error" => ExchangeError::Maintenance(message),
        _ if status == reqwest::StatusCode::UNAUTHORIZED => ExchangeError::Auth(message),
        _ => ExchangeError::Network(format!("upbit error {}: {}", name, message)),
    }
}

fn str_f64(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}
