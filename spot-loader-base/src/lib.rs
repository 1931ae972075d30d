pub mod interval;
mod time;
mod types;

pub use interval::IntervalError;
pub use time::{millis_to_datetime, now_millis};
pub use types::{KlineInterval, QuoteSymbols, Symbol};
