//! Shared test doubles for orchestration tests

use airdrop_runner::exchanges::{
    Balance, Exchange, ExchangeClient, ExchangeError, OrderReceipt, OrderSide,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counters observed by tests across one or more fake clients
#[derive(Default)]
pub struct Probe {
    active_jobs: AtomicUsize,
    max_jobs: AtomicUsize,
    active_submissions: AtomicUsize,
    max_submissions: AtomicUsize,
    pub buy_calls: AtomicUsize,
    pub sell_calls: AtomicUsize,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_jobs.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_submissions(&self) -> usize {
        self.max_submissions.load(Ordering::SeqCst)
    }

    fn enter(active: &AtomicUsize, max: &AtomicUsize) {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(active: &AtomicUsize) {
        active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted exchange client: succeeds unless errors were queued per symbol
pub struct FakeClient {
    exchange: Exchange,
    fill_quantity: f64,
    submit_delay: Duration,
    buy_errors: Mutex<HashMap<String, Vec<ExchangeError>>>,
    sell_errors: Mutex<HashMap<String, Vec<ExchangeError>>>,
    probe: Arc<Probe>,
}

impl FakeClient {
    pub fn new(probe: Arc<Probe>) -> Self {
        Self {
            exchange: Exchange::Bithumb,
            fill_quantity: 1.0,
            submit_delay: Duration::from_millis(10),
            buy_errors: Mutex::new(HashMap::new()),
            sell_errors: Mutex::new(HashMap::new()),
            probe,
        }
    }

    /// Queue errors for the next buys of `symbol`, consumed in order
    pub fn fail_buy(self, symbol: &str, errors: Vec<ExchangeError>) -> Self {
        self.buy_errors
            .lock()
            .unwrap()
            .insert(symbol.to_string(), errors);
        self
    }

    /// Queue errors for the next sells of `symbol`, consumed in order
    pub fn fail_sell(self, symbol: &str, errors: Vec<ExchangeError>) -> Self {
        self.sell_errors
            .lock()
            .unwrap()
            .insert(symbol.to_string(), errors);
        self
    }

    fn pop_error(
        table: &Mutex<HashMap<String, Vec<ExchangeError>>>,
        symbol: &str,
    ) -> Option<ExchangeError> {
        let mut table = table.lock().unwrap();
        let errors = table.get_mut(symbol)?;
        if errors.is_empty() {
            None
        } else {
            Some(errors.remove(0))
        }
    }

    fn receipt(symbol: &str, side: OrderSide, amount: f64) -> OrderReceipt {
        OrderReceipt {
            order_id: format!("fake-{}-{}", symbol, side),
            symbol: symbol.to_string(),
            side,
            amount,
            timestamp: 0,
        }
    }
}

#[async_trait]
impl ExchangeClient for FakeClient {
    fn exchange(&self) -> Exchange {
        self.exchange
    }

    fn min_order_quote(&self) -> f64 {
        5_500.0
    }

    async fn get_balance(&self, currency: &str) -> Result<Balance, ExchangeError> {
        Ok(Balance {
            currency: currency.to_string(),
            free: self.fill_quantity,
            locked: 0.0,
        })
    }

    async fn get_all_balances(&self) -> Result<HashMap<String, Balance>, ExchangeError> {
        Ok(HashMap::new())
    }

    async fn place_market_buy(
        &self,
        symbol: &str,
        quote_amount: f64,
    ) -> Result<OrderReceipt, ExchangeError> {
        self.probe.buy_calls.fetch_add(1, Ordering::SeqCst);
        Probe::enter(&self.probe.active_jobs, &self.probe.max_jobs);
        Probe::enter(
            &self.probe.active_submissions,
            &self.probe.max_submissions,
        );
        tokio::time::sleep(self.submit_delay).await;
        Probe::exit(&self.probe.active_submissions);

        if let Some(error) = Self::pop_error(&self.buy_errors, symbol) {
            Probe::exit(&self.probe.active_jobs);
            return Err(error);
        }
        Ok(Self::receipt(symbol, OrderSide::Buy, quote_amount))
    }

    async fn place_market_sell(
        &self,
        symbol: &str,
        base_quantity: f64,
    ) -> Result<OrderReceipt, ExchangeError> {
        self.probe.sell_calls.fetch_add(1, Ordering::SeqCst);
        Probe::enter(
            &self.probe.active_submissions,
            &self.probe.max_submissions,
        );
        tokio::time::sleep(self.submit_delay).await;
        Probe::exit(&self.probe.active_submissions);

        if let Some(error) = Self::pop_error(&self.sell_errors, symbol) {
            return Err(error);
        }
        Probe::exit(&self.probe.active_jobs);
        Ok(Self::receipt(symbol, OrderSide::Sell, base_quantity))
    }

    async fn get_filled_quantity(
        &self,
        _symbol: &str,
        _receipt: &OrderReceipt,
    ) -> Result<f64, ExchangeError> {
        Ok(self.fill_quantity)
    }

    async fn get_last_price(&self, _symbol: &str) -> Result<f64, ExchangeError> {
        Ok(1_000.0)
    }
}
