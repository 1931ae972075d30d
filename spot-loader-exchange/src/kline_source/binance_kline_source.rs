use super::{KlineRequest, KlineSource, RawKline, SymbolStatus};
use crate::{client::ClientError, BinanceClient};
use anyhow::Result;
use spot_loader_base::{QuoteSymbols, Symbol};
use std::collections::HashSet;

/// [`KlineSource`] backed by the Binance spot REST API.
#[derive(Debug, Clone)]
pub struct BinanceKlineSource {
    client: BinanceClient,
}

impl BinanceKlineSource {
    pub fn new(client: BinanceClient) -> Self {
        BinanceKlineSource { client }
    }

    // binance 使用阻塞的 reqwest 客户端, 不能直接在异步上下文中调用
    // 报错信息: Cannot drop a runtime in a context where blocking is not allowed.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&BinanceClient) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let client = self.client.clone();

        tokio::task::spawn_blocking(move || f(&client))
            .await
            .map_err(ClientError::Join)?
    }
}

impl KlineSource for BinanceKlineSource {
    async fn ping(&self) -> Result<()> {
        self.blocking(|client| client.spot().ping()).await?;
        tracing::info!("connected to the Binance API");

        Ok(())
    }

    async fn fetch_symbols(&self, quote_symbols: &QuoteSymbols) -> Result<Vec<Symbol>> {
        let statuses = self
            .blocking(|client| client.spot().get_symbol_statuses())
            .await?;

        Ok(quote_symbols.filter(statuses.into_iter().map(|status| status.symbol)))
    }

    async fn fetch_trading_status(&self, symbols: &[Symbol]) -> Result<Vec<SymbolStatus>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let wanted = symbols.iter().collect::<HashSet<_>>();

        let statuses = self
            .blocking(|client| client.spot().get_symbol_statuses())
            .await?
            .into_iter()
            .filter(|status| wanted.contains(&status.symbol))
            .collect();

        Ok(statuses)
    }

    async fn fetch_klines(&self, request: &KlineRequest) -> Result<Vec<RawKline>> {
        let request = request.clone();

        self.blocking(move |client| client.spot().get_klines(&request))
            .await
    }
}
