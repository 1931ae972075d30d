use thiserror::Error;

const MINUTE_MILLIS: i64 = 60 * 1000;
const HOUR_MILLIS: i64 = 60 * MINUTE_MILLIS;
const DAY_MILLIS: i64 = 24 * HOUR_MILLIS;
const WEEK_MILLIS: i64 = 7 * DAY_MILLIS;

// 连续多少个周期没有新K线才认为交易对停止交易
pub const INACTIVE_AFTER_INTERVALS: i64 = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    #[error("invalid interval unit: {0:?}")]
    InvalidUnit(String),
    #[error("invalid interval count: {0:?}")]
    InvalidCount(String),
    #[error("unsupported interval: {0:?}")]
    Unsupported(String),
}

// 将时间间隔转换为毫秒, 例如 "1h" => 3_600_000
pub fn interval_to_milliseconds(interval: &str) -> Result<i64, IntervalError> {
    let mut chars = interval.chars();
    let unit = chars
        .next_back()
        .ok_or_else(|| IntervalError::InvalidUnit(interval.to_string()))?;

    let unit_millis = match unit {
        'm' => MINUTE_MILLIS,
        'h' => HOUR_MILLIS,
        'd' => DAY_MILLIS,
        'w' => WEEK_MILLIS,
        _ => return Err(IntervalError::InvalidUnit(interval.to_string())),
    };

    let count = chars
        .as_str()
        .parse::<i64>()
        .ok()
        .filter(|count| *count > 0)
        .ok_or_else(|| IntervalError::InvalidCount(interval.to_string()))?;

    count
        .checked_mul(unit_millis)
        .ok_or_else(|| IntervalError::InvalidCount(interval.to_string()))
}

// 下一个周期的开始时间
pub fn next_bucket_start(interval: &str, timestamp: i64) -> Result<i64, IntervalError> {
    Ok(timestamp + interval_to_milliseconds(interval)?)
}

// 周期是否已经收盘: open_time + (1 + margin) 个周期之后才算收盘
pub fn is_bucket_closed(interval_millis: i64, margin: i64, open_time: i64, now: i64) -> bool {
    open_time + (1 + margin) * interval_millis <= now
}

// 超过 10 个周期没有新K线则认为交易对不活跃
pub fn is_symbol_active(interval_millis: i64, open_time: i64, now: i64) -> bool {
    now - open_time <= INACTIVE_AFTER_INTERVALS * interval_millis
}
