use super::BinanceClient;
use crate::{
    client::ClientError,
    kline_source::{KlineRequest, RawKline, SymbolStatus},
};
use anyhow::Result;
use binance::{
    api::Binance,
    general::General,
    market::Market,
    model::KlineSummaries,
};

/// Blocking spot endpoints, already mapped onto loader types.
#[derive(Clone)]
pub struct Spot<'a> {
    client: &'a BinanceClient,
}

impl<'a> Spot<'a> {
    pub fn new(client: &'a BinanceClient) -> Self {
        Spot { client }
    }

    fn market(&self) -> Market {
        self.client.create_api(Market::new, Market::new_with_config)
    }

    fn general(&self) -> General {
        self.client
            .create_api(General::new, General::new_with_config)
    }

    // GET /api/v3/ping
    pub fn ping(&self) -> Result<()> {
        self.general().ping().map_err(ClientError::from)?;

        Ok(())
    }

    // GET /api/v3/exchangeInfo, 所有交易对及其交易状态
    pub fn get_symbol_statuses(&self) -> Result<Vec<SymbolStatus>> {
        let exchange_info = self
            .general()
            .exchange_info()
            .map_err(ClientError::from)?;

        let statuses = exchange_info
            .symbols
            .into_iter()
            .map(|symbol_info| SymbolStatus::new(symbol_info.symbol, symbol_info.status))
            .collect();

        Ok(statuses)
    }

    // GET /api/v3/klines, 负的时间戳按 0 处理
    pub fn get_klines(&self, request: &KlineRequest) -> Result<Vec<RawKline>> {
        let KlineSummaries::AllKlineSummaries(klines) = self
            .market()
            .get_klines(
                request.symbol.as_ref(),
                request.interval,
                request.limit,
                request.start_time.map(|time| time.max(0) as u64),
                request.end_time.map(|time| time.max(0) as u64),
            )
            .map_err(ClientError::from)?;

        Ok(klines.into_iter().map(RawKline::from).collect())
    }
}
