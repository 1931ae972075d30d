use anyhow::Result;
use bon::Builder;
use chrono::{DateTime, Utc};
use spot_loader_base::{KlineInterval, Symbol};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};

const UPSERT_CHUNK_SIZE: usize = 5000;

/// Per-symbol pointer to the newest closed candle stored for an interval.
#[derive(Builder, Debug, Clone, PartialEq, Eq, FromRow)]
#[builder(on(Symbol, into), on(String, into))]
pub struct Cursor {
    pub symbol: Symbol,           // 交易对
    pub candle_id: i64,           // 指向的K线ID
    pub open_time: DateTime<Utc>, // 指向的K线开盘时间
    #[builder(default = true)]
    pub active: bool,             // 是否还在交易
    pub source: String,           // 数据来源
}

pub async fn list(conn: &mut PgConnection, interval: KlineInterval) -> Result<Vec<Cursor>> {
    let sql = format!(
        "SELECT symbol, candle_id, open_time, active, source FROM {} ORDER BY symbol ASC",
        interval.cursor_table()
    );

    let cursors = sqlx::query_as::<_, Cursor>(&sql)
        .fetch_all(&mut *conn)
        .await?;

    Ok(cursors)
}

pub async fn list_inactive_symbols(
    conn: &mut PgConnection,
    interval: KlineInterval,
) -> Result<Vec<Symbol>> {
    let sql = format!(
        "SELECT symbol FROM {} WHERE active = FALSE ORDER BY symbol ASC",
        interval.cursor_table()
    );

    let symbols = sqlx::query_scalar::<_, Symbol>(&sql)
        .fetch_all(&mut *conn)
        .await?;

    Ok(symbols)
}

// 按交易对写入游标, 冲突时整行覆盖
pub async fn upsert_many(
    conn: &mut PgConnection,
    interval: KlineInterval,
    cursors: &[Cursor],
) -> Result<u64> {
    let mut affected = 0;

    for chunk in cursors.chunks(UPSERT_CHUNK_SIZE) {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} (symbol, candle_id, open_time, active, source) ",
            interval.cursor_table()
        ));

        builder.push_values(chunk, |mut row, cursor| {
            row.push_bind(cursor.symbol.clone())
                .push_bind(cursor.candle_id)
                .push_bind(cursor.open_time)
                .push_bind(cursor.active)
                .push_bind(cursor.source.clone());
        });

        builder.push(
            r#"
            ON CONFLICT (symbol)
            DO UPDATE SET
                candle_id = EXCLUDED.candle_id,
                open_time = EXCLUDED.open_time,
                active = EXCLUDED.active,
                source = EXCLUDED.source
            "#,
        );

        affected += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(affected)
}

// 只修改 active 标记, 游标位置不变
pub async fn reactivate(
    conn: &mut PgConnection,
    interval: KlineInterval,
    symbols: &[Symbol],
) -> Result<u64> {
    if symbols.is_empty() {
        return Ok(0);
    }

    let symbols = symbols
        .iter()
        .map(|symbol| symbol.to_string())
        .collect::<Vec<_>>();

    let sql = format!(
        "UPDATE {} SET active = TRUE WHERE active = FALSE AND symbol = ANY($1)",
        interval.cursor_table()
    );

    let result = sqlx::query(&sql).bind(symbols).execute(&mut *conn).await?;

    Ok(result.rows_affected())
}
