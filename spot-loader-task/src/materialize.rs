use anyhow::{anyhow, ensure, Context, Result};
use rust_decimal::Decimal;
use spot_loader_base::{millis_to_datetime, KlineInterval, Symbol};
use spot_loader_database::{Candle, Cursor};
use spot_loader_exchange::RawKline;

fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    value
        .parse::<Decimal>()
        .with_context(|| format!("invalid {}: {:?}", field, value))
}

pub fn build_candle(symbol: &Symbol, raw: &RawKline, id: i64) -> Result<Candle> {
    ensure!(raw.trades >= 0, "negative trade count: {}", raw.trades);
    ensure!(
        raw.open_time < raw.close_time,
        "open time {} is not before close time {}",
        raw.open_time,
        raw.close_time
    );

    let candle = Candle::builder()
        .id(id)
        .symbol(symbol)
        .open_time(millis_to_datetime(raw.open_time)?)
        .open_price(parse_decimal("open price", &raw.open)?)
        .high_price(parse_decimal("high price", &raw.high)?)
        .low_price(parse_decimal("low price", &raw.low)?)
        .close_price(parse_decimal("close price", &raw.close)?)
        .volume(parse_decimal("volume", &raw.volume)?)
        .close_time(millis_to_datetime(raw.close_time)?)
        .quote_volume(parse_decimal("quote volume", &raw.quote_volume)?)
        .trades(raw.trades)
        .taker_buy_volume(parse_decimal("taker buy volume", &raw.taker_buy_volume)?)
        .taker_buy_quote_volume(parse_decimal(
            "taker buy quote volume",
            &raw.taker_buy_quote_volume,
        )?)
        .build();

    Ok(candle)
}

/// Normalises one page of upstream klines, pairing each record with a freshly minted id.
pub fn build_candles(symbol: &Symbol, raws: &[RawKline], ids: &[i64]) -> Result<Vec<Candle>> {
    if raws.len() != ids.len() {
        return Err(anyhow!(
            "got {} ids for {} klines of {}",
            ids.len(),
            raws.len(),
            symbol
        ));
    }

    raws.iter()
        .zip(ids)
        .map(|(raw, id)| {
            build_candle(symbol, raw, *id)
                .with_context(|| format!("{} kline at {}", symbol, raw.open_time))
        })
        .collect()
}

/// Cursor for the newest candle known to be closed.
///
/// With several candles the last one may still be open, so the cursor stops on the
/// second-to-last. A lone candle only moves the cursor once ten intervals have passed
/// without a newer one, and then marks the symbol inactive.
pub fn latest_cursor(
    candles: &[Candle],
    interval: KlineInterval,
    now: i64,
    source: &str,
) -> Option<Cursor> {
    let (candle, active) = match candles {
        [] => return None,
        [candle] => {
            let open_time = candle.open_time.timestamp_millis();
            // 仍在活跃窗口内, 等下一根K线再推进游标
            if !interval.is_bucket_closed(open_time, now)
                || interval.is_symbol_active(open_time, now)
            {
                return None;
            }
            (candle, false)
        }
        [.., candle, _] => (candle, true),
    };

    let cursor = Cursor::builder()
        .symbol(&candle.symbol)
        .candle_id(candle.id)
        .open_time(candle.open_time)
        .active(active)
        .source(source)
        .build();

    Some(cursor)
}
