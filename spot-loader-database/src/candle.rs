use anyhow::Result;
use bon::Builder;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use spot_loader_base::{KlineInterval, Symbol};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};

// 每行 13 个绑定参数, 单条语句不能超过 65535 个
const UPSERT_CHUNK_SIZE: usize = 2000;

#[derive(Builder, Debug, Clone, PartialEq, Eq, FromRow)]
#[builder(on(Symbol, into))]
pub struct Candle {
    pub id: i64,                        // 主键ID
    pub symbol: Symbol,                 // 交易对
    pub open_time: DateTime<Utc>,       // 开盘时间
    pub open_price: Decimal,            // 开盘价格
    pub high_price: Decimal,            // 最高价格
    pub low_price: Decimal,             // 最低价格
    pub close_price: Decimal,           // 收盘价格
    pub volume: Decimal,                // 成交量
    pub close_time: DateTime<Utc>,      // 收盘时间
    pub quote_volume: Decimal,          // 成交额
    pub trades: i64,                    // 成交笔数
    pub taker_buy_volume: Decimal,      // 主动买入成交量
    pub taker_buy_quote_volume: Decimal, // 主动买入成交额
}

/// Identity of a row after an upsert. `id` is whatever the table holds, which for a
/// pre-existing `(symbol, open_time)` is the id assigned the first time it was written.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PersistedCandle {
    pub symbol: Symbol,
    pub open_time: DateTime<Utc>,
    pub id: i64,
}

// 批量写入K线, 冲突时覆盖除 id 之外的所有字段
pub async fn upsert_many(
    conn: &mut PgConnection,
    interval: KlineInterval,
    candles: &[Candle],
) -> Result<Vec<PersistedCandle>> {
    let mut persisted = Vec::with_capacity(candles.len());

    for chunk in candles.chunks(UPSERT_CHUNK_SIZE) {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} (id, symbol, open_time, open_price, high_price, low_price, close_price, volume, close_time, quote_volume, trades, taker_buy_volume, taker_buy_quote_volume) ",
            interval.candle_table()
        ));

        builder.push_values(chunk, |mut row, candle| {
            row.push_bind(candle.id)
                .push_bind(candle.symbol.clone())
                .push_bind(candle.open_time)
                .push_bind(candle.open_price)
                .push_bind(candle.high_price)
                .push_bind(candle.low_price)
                .push_bind(candle.close_price)
                .push_bind(candle.volume)
                .push_bind(candle.close_time)
                .push_bind(candle.quote_volume)
                .push_bind(candle.trades)
                .push_bind(candle.taker_buy_volume)
                .push_bind(candle.taker_buy_quote_volume);
        });

        builder.push(
            r#"
            ON CONFLICT (symbol, open_time)
            DO UPDATE SET
                open_price = EXCLUDED.open_price,
                high_price = EXCLUDED.high_price,
                low_price = EXCLUDED.low_price,
                close_price = EXCLUDED.close_price,
                volume = EXCLUDED.volume,
                close_time = EXCLUDED.close_time,
                quote_volume = EXCLUDED.quote_volume,
                trades = EXCLUDED.trades,
                taker_buy_volume = EXCLUDED.taker_buy_volume,
                taker_buy_quote_volume = EXCLUDED.taker_buy_quote_volume
            RETURNING symbol, open_time, id
            "#,
        );

        let rows = builder
            .build_query_as::<PersistedCandle>()
            .fetch_all(&mut *conn)
            .await?;

        persisted.extend(rows);
    }

    Ok(persisted)
}

#[cfg(test)]
pub async fn list(
    conn: &mut PgConnection,
    interval: KlineInterval,
    symbol: &Symbol,
) -> Result<Vec<Candle>> {
    let sql = format!(
        r#"
        SELECT * FROM {}
            WHERE symbol = $1
            ORDER BY open_time ASC
        "#,
        interval.candle_table()
    );

    let candles = sqlx::query_as::<_, Candle>(&sql)
        .bind(symbol.as_ref())
        .fetch_all(&mut *conn)
        .await?;

    Ok(candles)
}

// 从序列中预取 count 个ID
pub async fn next_ids(
    conn: &mut PgConnection,
    interval: KlineInterval,
    count: usize,
) -> Result<Vec<i64>> {
    if count == 0 {
        return Ok(vec![]);
    }

    let mut ids = sqlx::query_scalar::<_, i64>(
        "SELECT nextval($1::regclass) FROM generate_series(1, $2)",
    )
    .bind(interval.id_sequence())
    .bind(count as i64)
    .fetch_all(&mut *conn)
    .await?;

    ids.sort_unstable();

    Ok(ids)
}
