use spot_loader_base::KlineInterval;
use std::time::Duration;

/// What a pass achieved, used to pick the next polling mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    pub active_count: usize,      // 工作列表中的交易对数量
    pub symbols_with_data: usize, // 实际拿到数据的交易对数量
    pub candles: usize,           // 写入的K线数量
    pub cursors: usize,           // 写入的游标数量
    pub full_pages: usize,        // 返回整页数据的交易对数量
    pub elapsed: Duration,
}

impl PassOutcome {
    // 有交易对没拿到数据, 或者有交易对还有积压, 都说明还没追上
    pub fn is_complete(&self) -> bool {
        self.symbols_with_data >= self.active_count && self.full_pages == 0
    }

    pub fn log_summary(&self, interval: KlineInterval) {
        tracing::info!(
            interval = %interval,
            symbols = self.active_count,
            with_data = self.symbols_with_data,
            candles = self.candles,
            cursors = self.cursors,
            complete = self.is_complete(),
            "pass finished in {:.2}s",
            self.elapsed.as_secs_f64()
        );
    }
}
