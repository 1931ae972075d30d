mod kline_interval;
mod quote_symbols;
mod symbol;

pub use kline_interval::KlineInterval;
pub use quote_symbols::QuoteSymbols;
pub use symbol::Symbol;
