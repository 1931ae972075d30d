mod binance_kline_source;
mod mock_kline_source;

pub use binance_kline_source::BinanceKlineSource;
pub use mock_kline_source::{kline_series, MockKlineSource};

use anyhow::Result;
use binance::model::KlineSummary;
use bon::Builder;
use spot_loader_base::{now_millis, KlineInterval, QuoteSymbols, Symbol};

pub const KLINE_LIMIT: u16 = 1000;

pub const TRADING_STATUS: &str = "TRADING";

#[derive(Builder, Clone, Debug, PartialEq, Eq)]
#[builder(on(Symbol, into))]
pub struct KlineRequest {
    pub symbol: Symbol,            // 交易对
    pub interval: KlineInterval,   // 时间间隔
    pub start_time: Option<i64>,   // 开始时间 (毫秒)
    pub end_time: Option<i64>,     // 结束时间 (毫秒)
    #[builder(default = KLINE_LIMIT)]
    pub limit: u16,                // 限制数量
}

/// One upstream kline record, numeric fields still in their wire representation.
#[derive(Builder, Clone, Debug, PartialEq, Eq)]
#[builder(on(String, into))]
pub struct RawKline {
    pub open_time: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub close_time: i64,
    pub quote_volume: String,
    pub trades: i64,
    pub taker_buy_volume: String,
    pub taker_buy_quote_volume: String,
}

impl From<KlineSummary> for RawKline {
    fn from(kline: KlineSummary) -> Self {
        RawKline {
            open_time: kline.open_time,
            open: kline.open,
            high: kline.high,
            low: kline.low,
            close: kline.close,
            volume: kline.volume,
            close_time: kline.close_time,
            quote_volume: kline.quote_asset_volume,
            trades: kline.number_of_trades,
            taker_buy_volume: kline.taker_buy_base_asset_volume,
            taker_buy_quote_volume: kline.taker_buy_quote_asset_volume,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolStatus {
    pub symbol: Symbol,
    pub status: String,
}

impl SymbolStatus {
    pub fn new(symbol: impl Into<Symbol>, status: impl Into<String>) -> Self {
        SymbolStatus {
            symbol: symbol.into(),
            status: status.into(),
        }
    }

    pub fn is_trading(&self) -> bool {
        self.status == TRADING_STATUS
    }
}

/// Upstream market data used by the loader.
#[allow(async_fn_in_trait)]
pub trait KlineSource {
    async fn ping(&self) -> Result<()>;

    // 获取所有以指定计价币种结尾的交易对
    async fn fetch_symbols(&self, quote_symbols: &QuoteSymbols) -> Result<Vec<Symbol>>;

    // 获取交易对的交易状态
    async fn fetch_trading_status(&self, symbols: &[Symbol]) -> Result<Vec<SymbolStatus>>;

    // 获取K线, 按开盘时间升序
    async fn fetch_klines(&self, request: &KlineRequest) -> Result<Vec<RawKline>>;

    // 交易对最早一根K线的开盘时间, 没有数据时返回 None
    async fn fetch_earliest_timestamp(
        &self,
        symbol: &Symbol,
        interval: KlineInterval,
    ) -> Result<Option<i64>> {
        let request = KlineRequest::builder()
            .symbol(symbol)
            .interval(interval)
            .start_time(0)
            .end_time(now_millis())
            .limit(1)
            .build();

        let klines = self.fetch_klines(&request).await?;

        Ok(klines.first().map(|kline| kline.open_time))
    }
}
