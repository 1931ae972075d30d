use crate::{
    candle::{self, Candle, PersistedCandle},
    cursor::{self, Cursor},
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use spot_loader_base::{KlineInterval, Symbol};
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};

/// Persistence used by the loader. Candles and cursors of one pass are written together or not at all.
#[allow(async_fn_in_trait)]
pub trait KlineStore {
    /// Round-trip to the store, returns a short description of the connection.
    async fn ping(&self) -> Result<String>;

    async fn get_cursors(&self, interval: KlineInterval) -> Result<Vec<Cursor>>;

    /// Reserves `count` fresh candle ids, ascending.
    async fn next_ids(&self, interval: KlineInterval, count: usize) -> Result<Vec<i64>>;

    /// Upserts the candles, then the cursors, in one atomic unit.
    ///
    /// A candle whose `(symbol, open_time)` already exists keeps its stored id, and every
    /// cursor is re-pointed at the id actually held by the store.
    async fn save_pass(
        &self,
        interval: KlineInterval,
        candles: &[Candle],
        cursors: &[Cursor],
    ) -> Result<()>;

    async fn get_inactive_symbols(&self, interval: KlineInterval) -> Result<Vec<Symbol>>;

    /// Sets `active` back to true, leaving the cursor position untouched.
    async fn reactivate_symbols(&self, interval: KlineInterval, symbols: &[Symbol])
        -> Result<u64>;
}

// 冲突的K线保留库里已有的ID, 游标需要跟着指向真实的ID
pub(crate) fn repoint_cursors(cursors: &[Cursor], persisted: &[PersistedCandle]) -> Vec<Cursor> {
    let ids = persisted
        .iter()
        .map(|row| ((&row.symbol, row.open_time), row.id))
        .collect::<HashMap<(&Symbol, DateTime<Utc>), i64>>();

    cursors
        .iter()
        .map(|cursor| {
            let mut cursor = cursor.clone();
            if let Some(id) = ids.get(&(&cursor.symbol, cursor.open_time)) {
                cursor.candle_id = *id;
            }
            cursor
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct PgKlineStore {
    db: Arc<PgPool>,
}

impl PgKlineStore {
    pub fn new(db: Arc<PgPool>) -> Self {
        PgKlineStore { db }
    }
}

impl KlineStore for PgKlineStore {
    async fn ping(&self) -> Result<String> {
        let info = sqlx::query_scalar::<_, String>(
            "SELECT CONCAT(current_user, '@', inet_server_addr(), ':', inet_server_port(), ' - ', version())",
        )
        .fetch_one(&*self.db)
        .await?;

        tracing::info!("connected to the database: {}", info);

        Ok(info)
    }

    async fn get_cursors(&self, interval: KlineInterval) -> Result<Vec<Cursor>> {
        let mut conn = self.db.acquire().await?;
        cursor::list(&mut conn, interval).await
    }

    async fn next_ids(&self, interval: KlineInterval, count: usize) -> Result<Vec<i64>> {
        let mut conn = self.db.acquire().await?;
        candle::next_ids(&mut conn, interval, count).await
    }

    async fn save_pass(
        &self,
        interval: KlineInterval,
        candles: &[Candle],
        cursors: &[Cursor],
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let persisted = candle::upsert_many(&mut tx, interval, candles).await?;
        let cursors = repoint_cursors(cursors, &persisted);
        cursor::upsert_many(&mut tx, interval, &cursors).await?;

        tx.commit().await?;

        tracing::debug!(
            "saved {} candles and {} cursors into {}",
            persisted.len(),
            cursors.len(),
            interval.candle_table()
        );

        Ok(())
    }

    async fn get_inactive_symbols(&self, interval: KlineInterval) -> Result<Vec<Symbol>> {
        let mut conn = self.db.acquire().await?;
        cursor::list_inactive_symbols(&mut conn, interval).await
    }

    async fn reactivate_symbols(
        &self,
        interval: KlineInterval,
        symbols: &[Symbol],
    ) -> Result<u64> {
        let mut conn = self.db.acquire().await?;
        cursor::reactivate(&mut conn, interval, symbols).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use spot_loader_base::millis_to_datetime;

    fn candle(id: i64, symbol: &str, open_time: i64) -> Result<Candle> {
        let candle = Candle::builder()
            .id(id)
            .symbol(symbol)
            .open_time(millis_to_datetime(open_time)?)
            .open_price(dec!(1))
            .high_price(dec!(1))
            .low_price(dec!(1))
            .close_price(dec!(1))
            .volume(dec!(1))
            .close_time(millis_to_datetime(open_time + 59_999)?)
            .quote_volume(dec!(1))
            .trades(1)
            .taker_buy_volume(dec!(0))
            .taker_buy_quote_volume(dec!(0))
            .build();

        Ok(candle)
    }

    fn cursor_of(candle: &Candle) -> Cursor {
        Cursor::builder()
            .symbol(&candle.symbol)
            .candle_id(candle.id)
            .open_time(candle.open_time)
            .source("BINANCE")
            .build()
    }

    #[test]
    fn test_repoint_cursors() -> Result<()> {
        let a = candle(10, "AAAUSDT", 1714136400000)?;
        let b = candle(11, "BBBUSDT", 1714136400000)?;

        // AAAUSDT 已经存在, 库里的ID是 3
        let persisted = vec![
            PersistedCandle {
                symbol: a.symbol.clone(),
                open_time: a.open_time,
                id: 3,
            },
            PersistedCandle {
                symbol: b.symbol.clone(),
                open_time: b.open_time,
                id: 11,
            },
        ];

        let cursors = repoint_cursors(&[cursor_of(&a), cursor_of(&b)], &persisted);

        assert_eq!(cursors[0].candle_id, 3);
        assert_eq!(cursors[1].candle_id, 11);

        Ok(())
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_save_pass(db: PgPool) -> Result<()> {
        let store = PgKlineStore::new(Arc::new(db));
        let interval = KlineInterval::OneMinute;

        assert!(store.ping().await?.contains('@'));

        let ids = store.next_ids(interval, 2).await?;
        let first = candle(ids[0], "AAAUSDT", 1714136400000)?;
        store
            .save_pass(interval, &[first.clone()], &[cursor_of(&first)])
            .await?;

        // 重放同一根K线, 新ID被丢弃, 游标仍指向最初的ID
        let replay = candle(ids[1], "AAAUSDT", 1714136400000)?;
        store
            .save_pass(interval, &[replay.clone()], &[cursor_of(&replay)])
            .await?;

        let cursors = store.get_cursors(interval).await?;
        assert_eq!(cursors.len(), 1);
        assert_eq!(cursors[0].candle_id, ids[0]);

        Ok(())
    }
}
