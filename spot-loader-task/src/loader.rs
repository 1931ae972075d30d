use crate::{
    batch::PassBatch,
    clock::Clock,
    cursor_resolver,
    materialize::{build_candles, latest_cursor},
    pass_outcome::PassOutcome,
    polling::{PollingController, PollingMode},
    request_budget::{RequestBudget, DEFAULT_COOLDOWN, DEFAULT_REQUEST_LIMIT},
};
use anyhow::Result;
use bon::Builder;
use spot_loader_base::{KlineInterval, QuoteSymbols, Symbol};
use spot_loader_database::KlineStore;
use spot_loader_exchange::{
    kline_source::{KLINE_LIMIT, TRADING_STATUS},
    KlineRequest, KlineSource,
};
use std::{
    future::Future,
    time::{Duration, Instant},
};

pub const DEFAULT_SOURCE_NAME: &str = "BINANCE";

pub const DEFAULT_STATUS_CHECK_PASSES: u64 = 10;

#[derive(Builder, Debug, Clone)]
#[builder(on(String, into))]
pub struct LoaderConfig {
    pub interval: KlineInterval,     // K线周期
    pub quote_symbols: QuoteSymbols, // 计价币种
    #[builder(default = DEFAULT_SOURCE_NAME.to_string())]
    pub source_name: String,         // 写入游标的数据来源
    #[builder(default = KLINE_LIMIT)]
    pub page_limit: u16,             // 每次请求的K线数量
    #[builder(default = DEFAULT_REQUEST_LIMIT)]
    pub request_limit: u64,          // 每多少次请求暂停一次
    #[builder(default = DEFAULT_COOLDOWN)]
    pub cooldown: Duration,          // 暂停时长
    #[builder(default = DEFAULT_STATUS_CHECK_PASSES)]
    pub status_check_passes: u64,    // 每多少轮检查一次交易状态
    #[builder(default)]
    pub clock: Clock,                // 判断收盘和活跃用的当前时间
}

/// Incremental kline loader session: owns the request budget and polling state for
/// the lifetime of the process.
pub struct SpotLoader<S, T> {
    source: S,
    store: T,
    config: LoaderConfig,
    budget: RequestBudget,
    polling: PollingController,
    passes: u64,
}

impl<S: KlineSource, T: KlineStore> SpotLoader<S, T> {
    pub fn new(source: S, store: T, config: LoaderConfig) -> Self {
        let budget = RequestBudget::new(config.request_limit, config.cooldown);
        let polling = PollingController::new(config.interval);

        SpotLoader {
            source,
            store,
            config,
            budget,
            polling,
            passes: 0,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn requests(&self) -> u64 {
        self.budget.count()
    }

    pub fn mode(&self) -> PollingMode {
        self.polling.mode()
    }

    pub fn polling(&self) -> &PollingController {
        &self.polling
    }

    // 拉取交易所中所有符合计价币种的交易对
    pub async fn fetch_symbols(&mut self) -> Result<Vec<Symbol>> {
        let symbols = self.source.fetch_symbols(&self.config.quote_symbols).await;
        self.budget.record_and_wait().await;
        let symbols = symbols?;

        tracing::info!(
            "found {} symbols quoted in {}",
            symbols.len(),
            self.config.quote_symbols
        );

        Ok(symbols)
    }

    /// One pass over `symbols`: resolve start times, fetch a page per symbol and commit
    /// everything in one store transaction.
    pub async fn run_once(&mut self, symbols: &[Symbol]) -> Result<PassOutcome> {
        let started = Instant::now();
        let interval = self.config.interval;

        let cursors = self.store.get_cursors(interval).await?;
        let work = cursor_resolver::resolve(
            &self.source,
            &mut self.budget,
            symbols,
            &cursors,
            interval,
        )
        .await?;

        tracing::info!(
            interval = %interval,
            symbols = work.active_count(),
            "starting pass"
        );

        let total = work.active_count();
        let mut batch = PassBatch::new(total);

        for (i, item) in work.items().iter().enumerate() {
            let request = KlineRequest::builder()
                .symbol(&item.symbol)
                .interval(interval)
                .start_time(item.start_time)
                .limit(self.config.page_limit)
                .build();

            let klines = self.source.fetch_klines(&request).await;
            self.budget.record_and_wait().await;

            let klines = match klines {
                Ok(klines) => klines,
                Err(e) => {
                    tracing::warn!(symbol = %item.symbol, "failed to fetch klines: {:#}", e);
                    continue;
                }
            };

            if klines.is_empty() {
                tracing::warn!(
                    symbol = %item.symbol,
                    start_time = item.start_time,
                    "no klines returned"
                );
                continue;
            }

            let ids = self.store.next_ids(interval, klines.len()).await?;

            let candles = match build_candles(&item.symbol, &klines, &ids) {
                Ok(candles) => candles,
                Err(e) => {
                    tracing::warn!(symbol = %item.symbol, "skipping malformed klines: {:#}", e);
                    continue;
                }
            };

            let now = self.config.clock.now();
            let cursor = latest_cursor(&candles, interval, now, &self.config.source_name);
            let full_page = klines.len() >= usize::from(self.config.page_limit);

            tracing::info!(
                progress = %format!("{}/{}", i + 1, total),
                symbol = %item.symbol,
                candles = candles.len(),
                "fetched klines"
            );

            batch.add(candles, cursor, full_page);
        }

        let outcome = batch.commit(&self.store, interval, started.elapsed()).await?;
        outcome.log_summary(interval);

        Ok(outcome)
    }

    /// Reinstates inactive symbols that upstream reports as trading again.
    /// Returns the number of cursors flipped back to active.
    pub async fn check_trading_status(&mut self) -> Result<u64> {
        let interval = self.config.interval;

        let inactive = self.store.get_inactive_symbols(interval).await?;
        if inactive.is_empty() {
            return Ok(0);
        }

        let statuses = self.source.fetch_trading_status(&inactive).await;
        self.budget.record_and_wait().await;

        let statuses = match statuses {
            Ok(statuses) => statuses,
            Err(e) => {
                tracing::warn!("failed to fetch trading status: {:#}", e);
                return Ok(0);
            }
        };

        let trading = statuses
            .into_iter()
            .filter(|status| status.is_trading())
            .map(|status| status.symbol)
            .collect::<Vec<_>>();

        if trading.is_empty() {
            return Ok(0);
        }

        let reinstated = self.store.reactivate_symbols(interval, &trading).await?;

        for symbol in &trading {
            tracing::info!(symbol = %symbol, status = TRADING_STATUS, "reinstated symbol");
        }

        Ok(reinstated)
    }

    // 第一轮之后检查一次交易状态, 之后每 status_check_passes 轮检查一次
    async fn run_pass(&mut self, symbols: &[Symbol]) -> Result<PassOutcome> {
        let outcome = self.run_once(symbols).await?;

        if self.passes % self.config.status_check_passes.max(1) == 0 {
            self.check_trading_status().await?;
        }
        self.passes += 1;

        Ok(outcome)
    }

    pub async fn run_single(&mut self) -> Result<PassOutcome> {
        let symbols = self.fetch_symbols().await?;
        self.run_pass(&symbols).await
    }

    pub async fn run_as_service(&mut self) -> Result<()> {
        self.run_as_service_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Loops pass, mode, sleep until a pass fails or `shutdown` resolves while waiting.
    pub async fn run_as_service_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let symbols = self.fetch_symbols().await?;
        tokio::pin!(shutdown);

        loop {
            let outcome = match self.run_pass(&symbols).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("pass failed: {:#}", e);
                    return Err(e);
                }
            };

            let mode = self.polling.observe(&outcome);
            let delay = self.polling.next_delay(&mut rand::thread_rng());

            tracing::info!(
                mode = %mode,
                "waiting {}s before the next pass",
                delay.as_secs()
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, stopping loader");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use spot_loader_base::millis_to_datetime;
    use spot_loader_database::{Cursor, MemoryKlineStore};
    use spot_loader_exchange::{kline_source::kline_series, MockKlineSource};

    const HOUR: i64 = 3_600_000;

    // 2024-04-26 13:00:00 UTC
    const BASE: i64 = 1714136400000;

    // 第六根K线 (BASE + 5h) 所在的周期还没收盘
    fn clock() -> Clock {
        Clock::manual(BASE + 5 * HOUR + 30 * 60_000)
    }

    fn config() -> LoaderConfig {
        config_with(clock())
    }

    fn config_with(clock: Clock) -> LoaderConfig {
        LoaderConfig::builder()
            .interval(KlineInterval::OneHour)
            .quote_symbols(QuoteSymbols::new(["USDT"]))
            .clock(clock)
            .build()
    }

    fn cursor(symbol: &str, open_time: i64, active: bool) -> Result<Cursor> {
        let cursor = Cursor::builder()
            .symbol(symbol)
            .candle_id(1000)
            .open_time(millis_to_datetime(open_time)?)
            .active(active)
            .source(DEFAULT_SOURCE_NAME)
            .build();

        Ok(cursor)
    }

    fn stored_cursor(store: &MemoryKlineStore, symbol: &str) -> Result<Cursor> {
        store
            .cursor(KlineInterval::OneHour, &symbol.into())
            .ok_or_else(|| anyhow!("missing cursor for {}", symbol))
    }

    fn last_start_time(source: &MockKlineSource) -> Result<Option<i64>> {
        let requests = source.requests();
        let last = requests.last().ok_or_else(|| anyhow!("no requests"))?;
        Ok(last.start_time)
    }

    #[tokio::test]
    async fn test_backfill_new_symbols() -> Result<()> {
        let interval = KlineInterval::OneHour;
        let source = MockKlineSource::new()
            .with_klines("AAAUSDT", kline_series(BASE, interval, 6))
            .with_klines("BBBUSDT", kline_series(BASE + 3 * HOUR, interval, 3))
            .with_klines("ETHBTC", kline_series(BASE, interval, 6));

        let mut loader = SpotLoader::new(source, MemoryKlineStore::new(), config());
        let outcome = loader.run_single().await?;

        assert_eq!(outcome.active_count, 2);
        assert_eq!(outcome.symbols_with_data, 2);
        assert_eq!(outcome.candles, 9);
        assert!(outcome.is_complete());

        let store = loader.store();
        assert_eq!(store.candles(interval).len(), 9);
        assert_eq!(store.commits(), 1);

        // 最后一根还没收盘, 游标停在倒数第二根
        let aaa = stored_cursor(store, "AAAUSDT")?;
        assert_eq!(aaa.open_time.timestamp_millis(), BASE + 4 * HOUR);
        assert!(aaa.active);
        let bbb = stored_cursor(store, "BBBUSDT")?;
        assert_eq!(bbb.open_time.timestamp_millis(), BASE + 4 * HOUR);

        // 游标指向的K线确实存在
        assert!(store
            .candles(interval)
            .iter()
            .any(|candle| candle.id == aaa.candle_id && candle.open_time == aaa.open_time));

        // 交易对列表 + 2 次最早时间 + 2 次K线
        assert_eq!(loader.requests(), 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_second_pass_resumes_after_cursor() -> Result<()> {
        let interval = KlineInterval::OneHour;
        let source =
            MockKlineSource::new().with_klines("AAAUSDT", kline_series(BASE, interval, 6));

        let mut loader = SpotLoader::new(source, MemoryKlineStore::new(), config());
        let symbols = vec![Symbol::new("AAAUSDT")];

        loader.run_once(&symbols).await?;
        let before = loader.store().candles(interval);

        let outcome = loader.run_once(&symbols).await?;

        assert_eq!(last_start_time(loader.source())?, Some(BASE + 5 * HOUR));

        // 只重新拿到未收盘的那一根, 数据和ID都不变
        assert_eq!(outcome.candles, 1);
        assert_eq!(outcome.cursors, 0);
        assert_eq!(loader.store().candles(interval), before);
        assert_eq!(
            stored_cursor(loader.store(), "AAAUSDT")?
                .open_time
                .timestamp_millis(),
            BASE + 4 * HOUR
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_silent_symbol_becomes_inactive() -> Result<()> {
        let interval = KlineInterval::OneHour;
        let last = BASE + 5 * HOUR;
        let clock = clock();
        let source =
            MockKlineSource::new().with_klines("AAAUSDT", kline_series(BASE, interval, 6));

        let mut loader =
            SpotLoader::new(source, MemoryKlineStore::new(), config_with(clock.clone()));
        let symbols = vec![Symbol::new("AAAUSDT")];

        loader.run_once(&symbols).await?;
        assert_eq!(
            stored_cursor(loader.store(), "AAAUSDT")?
                .open_time
                .timestamp_millis(),
            last - HOUR
        );

        // 最后一根已收盘, 之后再没有新K线
        clock.set(last + 2 * HOUR);
        let outcome = loader.run_once(&symbols).await?;

        assert_eq!(last_start_time(loader.source())?, Some(last));
        assert_eq!(outcome.candles, 1);
        assert_eq!(outcome.cursors, 0);
        assert!(outcome.is_complete());
        let aaa = stored_cursor(loader.store(), "AAAUSDT")?;
        assert_eq!(aaa.open_time.timestamp_millis(), last - HOUR);
        assert!(aaa.active);

        // 仍然从最后一根开始请求, 直到超过 10 个周期
        clock.set(last + 11 * HOUR);
        let outcome = loader.run_once(&symbols).await?;

        assert_eq!(last_start_time(loader.source())?, Some(last));
        assert_eq!(outcome.cursors, 1);
        let aaa = stored_cursor(loader.store(), "AAAUSDT")?;
        assert_eq!(aaa.open_time.timestamp_millis(), last);
        assert!(!aaa.active);

        // 不再请求该交易对, 轮询回到常规节奏
        let requests = loader.source().requests().len();
        let outcome = loader.run_once(&symbols).await?;

        assert_eq!(outcome.active_count, 0);
        assert_eq!(loader.source().requests().len(), requests);
        let mut polling = PollingController::new(interval);
        assert_eq!(polling.observe(&outcome), PollingMode::Steady);

        Ok(())
    }

    #[tokio::test]
    async fn test_partial_pass_catches_up() -> Result<()> {
        let interval = KlineInterval::OneHour;
        let names = ["AAAUSDT", "BBBUSDT", "CCCUSDT", "DDDUSDT", "EEEUSDT"];

        let mut store = MemoryKlineStore::new();
        for name in names {
            store = store.with_cursor(interval, cursor(name, BASE, true)?);
        }

        let source = MockKlineSource::new()
            .with_klines("AAAUSDT", kline_series(BASE, interval, 4))
            .with_klines("BBBUSDT", kline_series(BASE, interval, 4))
            .with_klines("CCCUSDT", kline_series(BASE, interval, 4))
            .with_klines("DDDUSDT", vec![])
            .with_klines("EEEUSDT", vec![])
            .with_failure("EEEUSDT");

        let mut loader = SpotLoader::new(source, store, config());
        let symbols = names.iter().map(|name| Symbol::new(*name)).collect::<Vec<_>>();

        let outcome = loader.run_once(&symbols).await?;

        assert_eq!(outcome.active_count, 5);
        assert_eq!(outcome.symbols_with_data, 3);
        assert!(!outcome.is_complete());

        let mut polling = PollingController::new(interval);
        assert_eq!(polling.observe(&outcome), PollingMode::CatchUp);
        let delay = polling.next_delay(&mut rand::thread_rng()).as_secs();
        assert!((1..=5).contains(&delay), "{delay}");

        // 没拿到数据的交易对游标不动
        let ddd = stored_cursor(loader.store(), "DDDUSDT")?;
        assert_eq!(ddd.open_time.timestamp_millis(), BASE);
        let aaa = stored_cursor(loader.store(), "AAAUSDT")?;
        assert_eq!(aaa.open_time.timestamp_millis(), BASE + 2 * HOUR);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_symbol_recovers_next_pass() -> Result<()> {
        let interval = KlineInterval::OneHour;
        let store = MemoryKlineStore::new().with_cursor(interval, cursor("AAAUSDT", BASE, true)?);
        let source = MockKlineSource::new()
            .with_klines("AAAUSDT", kline_series(BASE, interval, 3))
            .with_failure("AAAUSDT");

        let mut loader = SpotLoader::new(source, store, config());
        let symbols = vec![Symbol::new("AAAUSDT")];

        let outcome = loader.run_once(&symbols).await?;

        assert_eq!(outcome.symbols_with_data, 0);
        assert!(!outcome.is_complete());
        assert_eq!(loader.store().commits(), 0);

        // 交易所恢复, 期间又产生了新K线
        let aaa = Symbol::new("AAAUSDT");
        loader.source().recover(&aaa);
        loader
            .source()
            .push_klines(aaa, kline_series(BASE + 3 * HOUR, interval, 3));

        let outcome = loader.run_once(&symbols).await?;

        assert_eq!(last_start_time(loader.source())?, Some(BASE + HOUR));
        assert_eq!(outcome.symbols_with_data, 1);
        assert_eq!(outcome.candles, 5);
        assert!(outcome.is_complete());
        assert_eq!(
            stored_cursor(loader.store(), "AAAUSDT")?
                .open_time
                .timestamp_millis(),
            BASE + 4 * HOUR
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_full_page_is_incomplete() -> Result<()> {
        let interval = KlineInterval::OneHour;
        let source =
            MockKlineSource::new().with_klines("AAAUSDT", kline_series(BASE, interval, 6));
        let config = LoaderConfig::builder()
            .interval(interval)
            .quote_symbols(QuoteSymbols::new(["USDT"]))
            .page_limit(2)
            .clock(clock())
            .build();

        let mut loader = SpotLoader::new(source, MemoryKlineStore::new(), config);
        let outcome = loader.run_once(&[Symbol::new("AAAUSDT")]).await?;

        assert_eq!(outcome.full_pages, 1);
        assert!(!outcome.is_complete());
        // 两根都已收盘, 游标停在第一根
        assert_eq!(
            stored_cursor(loader.store(), "AAAUSDT")?
                .open_time
                .timestamp_millis(),
            BASE
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_klines_are_skipped() -> Result<()> {
        let interval = KlineInterval::OneHour;
        let mut broken = kline_series(BASE, interval, 3);
        broken[0].volume = "n/a".into();

        let source = MockKlineSource::new()
            .with_klines("AAAUSDT", broken)
            .with_klines("BBBUSDT", kline_series(BASE, interval, 3));

        let mut loader = SpotLoader::new(source, MemoryKlineStore::new(), config());
        let outcome = loader
            .run_once(&[Symbol::new("AAAUSDT"), Symbol::new("BBBUSDT")])
            .await?;

        assert_eq!(outcome.symbols_with_data, 1);
        assert!(loader
            .store()
            .cursor(interval, &"AAAUSDT".into())
            .is_none());
        assert!(loader
            .store()
            .cursor(interval, &"BBBUSDT".into())
            .is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_reinstate_trading_symbols() -> Result<()> {
        let interval = KlineInterval::OneHour;
        let store = MemoryKlineStore::new()
            .with_cursor(interval, cursor("AAAUSDT", BASE, false)?)
            .with_cursor(interval, cursor("BBBUSDT", BASE, false)?);
        let source = MockKlineSource::new()
            .with_klines("AAAUSDT", kline_series(BASE, interval, 4))
            .with_status("AAAUSDT", "TRADING")
            .with_status("BBBUSDT", "BREAK");

        let mut loader = SpotLoader::new(source, store, config());

        // 不活跃的交易对不会被请求
        let outcome = loader.run_once(&[Symbol::new("AAAUSDT")]).await?;
        assert_eq!(outcome.active_count, 0);
        assert!(loader.source().requests().is_empty());

        assert_eq!(loader.check_trading_status().await?, 1);

        let aaa = stored_cursor(loader.store(), "AAAUSDT")?;
        assert!(aaa.active);
        assert_eq!(aaa.candle_id, 1000);
        assert_eq!(aaa.open_time.timestamp_millis(), BASE);
        assert!(!stored_cursor(loader.store(), "BBBUSDT")?.active);

        Ok(())
    }

    #[tokio::test]
    async fn test_status_check_cadence() -> Result<()> {
        let interval = KlineInterval::OneHour;
        let store = MemoryKlineStore::new().with_cursor(interval, cursor("AAAUSDT", BASE, false)?);
        let config = LoaderConfig::builder()
            .interval(interval)
            .quote_symbols(QuoteSymbols::new(["USDT"]))
            .status_check_passes(2)
            .clock(clock())
            .build();

        let mut loader = SpotLoader::new(MockKlineSource::new(), store, config);
        let symbols = vec![Symbol::new("AAAUSDT")];

        for _ in 0..5 {
            loader.run_pass(&symbols).await?;
        }

        // 第 1, 3, 5 轮之后检查
        assert_eq!(loader.source().status_requests().len(), 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_service_stops_on_store_failure() -> Result<()> {
        let interval = KlineInterval::OneHour;
        let source =
            MockKlineSource::new().with_klines("AAAUSDT", kline_series(BASE, interval, 3));
        let store = MemoryKlineStore::new();
        store.fail_saves(true);

        let mut loader = SpotLoader::new(source, store, config());
        let result = loader
            .run_as_service_until(std::future::pending::<()>())
            .await;

        assert!(result.is_err());
        assert!(loader.store().candles(interval).is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_service_stops_on_shutdown() -> Result<()> {
        let interval = KlineInterval::OneHour;
        let source =
            MockKlineSource::new().with_klines("AAAUSDT", kline_series(BASE, interval, 6));

        let mut loader = SpotLoader::new(source, MemoryKlineStore::new(), config());
        loader.run_as_service_until(async {}).await?;

        assert_eq!(loader.store().commits(), 1);
        assert_eq!(loader.mode(), PollingMode::Steady);

        Ok(())
    }
}
