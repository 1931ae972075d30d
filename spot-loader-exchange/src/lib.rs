mod client;
mod exchange;
pub mod kline_source;

pub use client::ClientError;
pub use exchange::binance::{BinanceClient, Credentials, Spot};
pub use kline_source::{
    BinanceKlineSource, KlineRequest, KlineSource, MockKlineSource, RawKline, SymbolStatus,
};
