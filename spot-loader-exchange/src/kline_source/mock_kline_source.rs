use super::{KlineRequest, KlineSource, RawKline, SymbolStatus};
use anyhow::{anyhow, Result};
use spot_loader_base::{KlineInterval, QuoteSymbols, Symbol};
use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
};

/// In-memory [`KlineSource`] serving canned klines to tests.
#[derive(Debug, Default)]
pub struct MockKlineSource {
    symbols: Vec<Symbol>,
    klines: RefCell<HashMap<Symbol, Vec<RawKline>>>,
    statuses: HashMap<Symbol, String>,
    failing: RefCell<HashSet<Symbol>>,
    requests: RefCell<Vec<KlineRequest>>,
    status_requests: RefCell<Vec<Vec<Symbol>>>,
}

impl MockKlineSource {
    pub fn new() -> Self {
        Self::default()
    }

    // 注册一个交易对及其K线
    pub fn with_klines(mut self, symbol: impl Into<Symbol>, klines: Vec<RawKline>) -> Self {
        let symbol = symbol.into();
        self.symbols.push(symbol.clone());
        self.klines.get_mut().insert(symbol, klines);
        self
    }

    pub fn with_status(mut self, symbol: impl Into<Symbol>, status: impl Into<String>) -> Self {
        self.statuses.insert(symbol.into(), status.into());
        self
    }

    pub fn with_failure(self, symbol: impl Into<Symbol>) -> Self {
        self.failing.borrow_mut().insert(symbol.into());
        self
    }

    // 模拟交易所产生了新的K线
    pub fn push_klines(&self, symbol: impl Into<Symbol>, klines: Vec<RawKline>) {
        self.klines
            .borrow_mut()
            .entry(symbol.into())
            .or_default()
            .extend(klines);
    }

    pub fn recover(&self, symbol: &Symbol) {
        self.failing.borrow_mut().remove(symbol);
    }

    pub fn requests(&self) -> Vec<KlineRequest> {
        self.requests.borrow().clone()
    }

    pub fn status_requests(&self) -> Vec<Vec<Symbol>> {
        self.status_requests.borrow().clone()
    }
}

impl KlineSource for MockKlineSource {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_symbols(&self, quote_symbols: &QuoteSymbols) -> Result<Vec<Symbol>> {
        Ok(quote_symbols.filter(self.symbols.iter().cloned()))
    }

    async fn fetch_trading_status(&self, symbols: &[Symbol]) -> Result<Vec<SymbolStatus>> {
        self.status_requests.borrow_mut().push(symbols.to_vec());

        let statuses = symbols
            .iter()
            .filter_map(|symbol| {
                self.statuses
                    .get(symbol)
                    .map(|status| SymbolStatus::new(symbol, status.as_str()))
            })
            .collect();

        Ok(statuses)
    }

    async fn fetch_klines(&self, request: &KlineRequest) -> Result<Vec<RawKline>> {
        self.requests.borrow_mut().push(request.clone());

        if self.failing.borrow().contains(&request.symbol) {
            return Err(anyhow!("request failed with status code 503"));
        }

        let start_time = request.start_time.unwrap_or(i64::MIN);
        let end_time = request.end_time.unwrap_or(i64::MAX);

        let mut klines = self
            .klines
            .borrow()
            .get(&request.symbol)
            .map(|klines| {
                klines
                    .iter()
                    .filter(|kline| kline.open_time >= start_time && kline.open_time <= end_time)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        klines.sort_by_key(|kline| kline.open_time);
        klines.truncate(request.limit as usize);

        Ok(klines)
    }
}

/// Consecutive klines starting at `first_open_time`, one per interval.
pub fn kline_series(first_open_time: i64, interval: KlineInterval, count: usize) -> Vec<RawKline> {
    (0..count as i64)
        .map(|i| {
            let open_time = first_open_time + i * interval.millis();
            let price = format!("{}.50", 100 + i);

            RawKline::builder()
                .open_time(open_time)
                .open(price.clone())
                .high(format!("{}.75", 100 + i))
                .low(format!("{}.25", 100 + i))
                .close(price)
                .volume("10.00000000")
                .close_time(open_time + interval.millis() - 1)
                .quote_volume("1005.00000000")
                .trades(42)
                .taker_buy_volume("4.00000000")
                .taker_buy_quote_volume("402.00000000")
                .build()
        })
        .collect()
}
