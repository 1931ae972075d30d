use anyhow::Result;
use chrono::{DateTime, Utc};

// 将毫秒转换为UTC时间
pub fn millis_to_datetime(millis: impl Into<i64>) -> Result<DateTime<Utc>> {
    let datetime = DateTime::<Utc>::from_timestamp_millis(millis.into())
        .ok_or_else(|| anyhow::anyhow!("millis is invalid"))?;

    Ok(datetime)
}

// 当前时间 (毫秒)
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
