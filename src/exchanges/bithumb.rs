//! Bithumb exchange client
//!
//! Private endpoints use Bithumb's Api-Sign scheme: HMAC-SHA512 over
//! `endpoint \0 urlencoded-params \0 nonce`, hex digest, then base64.

use crate::exchanges::{
    traits::{Balance, ExchangeClient, ExchangeError, OrderReceipt, OrderSide},
    transport_error, Exchange,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha512;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const API_URL: &str = "https://api.bithumb.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_ORDER_KRW: f64 = 5_500.0;
const BALANCE_POLL_ATTEMPTS: u32 = 3;
const BALANCE_POLL_DELAY: Duration = Duration::from_secs(2);

type HmacSha512 = Hmac<Sha512>;

/// REST client for one Bithumb account
pub struct BithumbClient {
    api_key: String,
    api_secret: String,
    base_url: String,
    http: reqwest::Client,
}

impl BithumbClient {
    /// Create a client for the given API credentials
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            api_key: api_key.trim_matches(|c| c == '\'' || c == '"').to_string(),
            api_secret: api_secret.trim_matches(|c| c == '\'' || c == '"').to_string(),
            base_url: API_URL.to_string(),
            http,
        }
    }

    /// Override the API base URL (HTTP-mock tests)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Sign a private request, returning (signature, nonce)
    fn sign(&self, endpoint: &str, encoded_params: &str, nonce: &str) -> String {
        let payload = format!("{}\0{}\0{}", endpoint, encoded_params, nonce);
        // HMAC accepts keys of any length, so this cannot fail in practice
        let mut mac = match HmacSha512::new_from_slice(self.api_secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(payload.as_bytes());
        let hex_digest = hex::encode(mac.finalize().into_bytes());
        BASE64.encode(hex_digest.as_bytes())
    }

    async fn private_post(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ExchangeError> {
        let mut pairs: Vec<(&str, String)> = vec![("endpoint", endpoint.to_string())];
        pairs.extend(params.iter().cloned());

        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();

        let nonce = chrono::Utc::now().timestamp_millis().to_string();
        let signature = self.sign(endpoint, &encoded, &nonce);

        let url = format!("{}{}", self.base_url, endpoint);
        debug!(endpoint, "bithumb private request");

        let response = self
            .http
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("Api-Sign", signature)
            .header("Api-Nonce", nonce)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(encoded)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_server_error() {
            return Err(ExchangeError::Maintenance(format!(
                "bithumb returned {}",
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(transport_error)?;
        check_status(&body)?;
        Ok(body)
    }

    async fn public_get(&self, path: &str) -> Result<Value, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await.map_err(transport_error)?;

        if response.status().is_server_error() {
            return Err(ExchangeError::Maintenance(format!(
                "bithumb returned {}",
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(transport_error)?;
        check_status(&body)?;
        Ok(body)
    }

    fn balance_from_data(data: &Value, currency: &str) -> Balance {
        let lower = currency.to_lowercase();
        Balance {
            currency: currency.to_uppercase(),
            free: field_f64(data, &format!("available_{}", lower)),
            locked: field_f64(data, &format!("in_use_{}", lower)),
        }
    }
}

#[async_trait]
impl ExchangeClient for BithumbClient {
    fn exchange(&self) -> Exchange {
        Exchange::Bithumb
    }

    fn min_order_quote(&self) -> f64 {
        MIN_ORDER_KRW
    }

    async fn get_balance(&self, currency: &str) -> Result<Balance, ExchangeError> {
        let body = self
            .private_post("/info/balance", &[("currency", currency.to_uppercase())])
            .await?;
        let data = body.get("data").cloned().unwrap_or(Value::Null);
        Ok(Self::balance_from_data(&data, currency))
    }

    async fn get_all_balances(&self) -> Result<HashMap<String, Balance>, ExchangeError> {
        let body = self
            .private_post("/info/balance", &[("currency", "ALL".to_string())])
            .await?;
        let data = body.get("data").cloned().unwrap_or(Value::Null);

        let mut balances = HashMap::new();
        if let Some(map) = data.as_object() {
            for key in map.keys() {
                if let Some(currency) = key.strip_prefix("total_") {
                    let total = field_f64(&data, key);
                    if total > 0.0 {
                        balances.insert(
                            currency.to_uppercase(),
                            Self::balance_from_data(&data, currency),
                        );
                    }
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
                "{:.0} KRW below bithumb minimum {:.0} KRW",
                quote_amount, MIN_ORDER_KRW
            )));
        }

        // Bithumb market buys are quantity-based, so convert KRW through
        // the last traded price first.
        let price = self.get_last_price(symbol).await?;
        if price <= 0.0 {
            return Err(ExchangeError::Network(format!(
                "no price available for {}",
                symbol
            )));
        }
        let units = quote_amount / price;

        let body = self
            .private_post(
                "/trade/market_buy",
                &[
                    ("order_currency", symbol.to_uppercase()),
                    ("payment_currency", "KRW".to_string()),
                    ("units", format!("{:.8}", units)),
                ],
            )
            .await?;

        let order_id = field_string(&body, "order_id");
        info!(symbol, order_id, quote_amount, "bithumb market buy accepted");

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
                "/trade/market_sell",
                &[
                    ("order_currency", symbol.to_uppercase()),
                    ("payment_currency", "KRW".to_string()),
                    ("units", format!("{:.8}", base_quantity)),
                ],
            )
            .await?;

        let order_id = field_string(&body, "order_id");
        info!(symbol, order_id, base_quantity, "bithumb market sell accepted");

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
        // Settlement can lag the order acknowledgement, so poll the balance.
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
        let path = format!("/public/ticker/{}_KRW", symbol.to_uppercase());
        let body = self.public_get(&path).await?;
        let price = body
            .get("data")
            .map(|d| field_f64(d, "closing_price"))
            .unwrap_or(0.0);

        if price <= 0.0 {
            error!(symbol, "bithumb ticker returned no closing price");
            return Err(ExchangeError::Network(format!(
                "no closing price for {}",
                symbol
            )));
        }
        Ok(price)
    }
}

/// Map a Bithumb API status code to an error, `Ok` on "0000"
fn check_status(body: &Value) -> Result<(), ExchangeError> {
    let status = body.get("status").and_then(Value::as_str).unwrap_or("0000");
    if status == "0000" {
        return Ok(());
    }

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message")
        .to_string();

    match status {
        // 5100 bad request / 5200 not member / 5300 invalid api key
        "5100" | "5200" | "5300" => Err(ExchangeError::Auth(message)),
        "5600" if is_balance_message(&message) => Err(ExchangeError::InsufficientBalance(message)),
        _ => Err(ExchangeError::Network(format!(
            "bithumb status {}: {}",
            status, message
        ))),
    }
}

fn is_balance_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("insufficient") || lower.contains("잔액") || lower.contains("부족")
}

/// Numeric fields arrive as JSON strings on Bithumb
fn field_f64(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn field_string(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
