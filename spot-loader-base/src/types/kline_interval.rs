use crate::interval::{self, interval_to_milliseconds, IntervalError};
use std::fmt;
use strum_macros::{AsRefStr, EnumIter, EnumString};

// 支持落库的K线周期, 每个周期对应一组表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, EnumIter)]
pub enum KlineInterval {
    #[strum(serialize = "1m")]
    OneMinute,
    #[strum(serialize = "1h")]
    OneHour,
}

impl KlineInterval {
    /// Validates the interval string, then maps it onto a supported storage type.
    pub fn parse(value: &str) -> Result<Self, IntervalError> {
        interval_to_milliseconds(value)?;

        value
            .parse::<KlineInterval>()
            .map_err(|_| IntervalError::Unsupported(value.to_string()))
    }

    pub fn millis(&self) -> i64 {
        match self {
            KlineInterval::OneMinute => 60_000,
            KlineInterval::OneHour => 3_600_000,
        }
    }

    pub fn candle_table(&self) -> &'static str {
        match self {
            KlineInterval::OneMinute => "spot_1m",
            KlineInterval::OneHour => "spot_1h",
        }
    }

    pub fn cursor_table(&self) -> &'static str {
        match self {
            KlineInterval::OneMinute => "latest_spot_1m",
            KlineInterval::OneHour => "latest_spot_1h",
        }
    }

    pub fn id_sequence(&self) -> &'static str {
        match self {
            KlineInterval::OneMinute => "spot_1m_id_seq",
            KlineInterval::OneHour => "spot_1h_id_seq",
        }
    }

    // 判断收盘时额外等待的周期数, 分钟线的最后一根经常不完整
    pub fn closed_margin(&self) -> i64 {
        match self {
            KlineInterval::OneMinute => 1,
            KlineInterval::OneHour => 0,
        }
    }

    pub fn next_bucket_start(&self, timestamp: i64) -> i64 {
        timestamp + self.millis()
    }

    pub fn is_bucket_closed(&self, open_time: i64, now: i64) -> bool {
        interval::is_bucket_closed(self.millis(), self.closed_margin(), open_time, now)
    }

    pub fn is_symbol_active(&self, open_time: i64, now: i64) -> bool {
        interval::is_symbol_active(self.millis(), open_time, now)
    }

    // 稳定状态下两次轮询之间的基础间隔 (秒), 为周期的四分之一
    pub fn steady_poll_secs(&self) -> u64 {
        (self.millis() / 1000 / 4) as u64
    }
}

impl From<KlineInterval> for String {
    fn from(value: KlineInterval) -> Self {
        value.as_ref().to_string()
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}
