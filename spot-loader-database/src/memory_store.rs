use crate::{
    candle::{Candle, PersistedCandle},
    cursor::Cursor,
    store::{repoint_cursors, KlineStore},
};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use spot_loader_base::{KlineInterval, Symbol};
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
};

#[derive(Debug, Default)]
struct IntervalTables {
    candles: BTreeMap<(Symbol, DateTime<Utc>), Candle>,
    cursors: BTreeMap<Symbol, Cursor>,
    sequence: i64,
}

/// In-process store with the same upsert semantics as the Postgres one, used by tests.
#[derive(Debug, Default)]
pub struct MemoryKlineStore {
    tables: RefCell<HashMap<KlineInterval, IntervalTables>>,
    fail_saves: Cell<bool>,
    commits: Cell<usize>,
}

impl MemoryKlineStore {
    pub fn new() -> Self {
        MemoryKlineStore::default()
    }

    pub fn with_cursor(self, interval: KlineInterval, cursor: Cursor) -> Self {
        self.tables
            .borrow_mut()
            .entry(interval)
            .or_default()
            .cursors
            .insert(cursor.symbol.clone(), cursor);
        self
    }

    // 之后的 save_pass 都会失败
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }

    pub fn commits(&self) -> usize {
        self.commits.get()
    }

    pub fn candles(&self, interval: KlineInterval) -> Vec<Candle> {
        self.tables
            .borrow()
            .get(&interval)
            .map(|tables| tables.candles.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn cursors(&self, interval: KlineInterval) -> Vec<Cursor> {
        self.tables
            .borrow()
            .get(&interval)
            .map(|tables| tables.cursors.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn cursor(&self, interval: KlineInterval, symbol: &Symbol) -> Option<Cursor> {
        self.tables
            .borrow()
            .get(&interval)
            .and_then(|tables| tables.cursors.get(symbol).cloned())
    }
}

impl KlineStore for MemoryKlineStore {
    async fn ping(&self) -> Result<String> {
        Ok("memory".to_string())
    }

    async fn get_cursors(&self, interval: KlineInterval) -> Result<Vec<Cursor>> {
        Ok(self.cursors(interval))
    }

    async fn next_ids(&self, interval: KlineInterval, count: usize) -> Result<Vec<i64>> {
        let mut tables = self.tables.borrow_mut();
        let tables = tables.entry(interval).or_default();

        let first = tables.sequence + 1;
        tables.sequence += count as i64;

        Ok((first..=tables.sequence).collect())
    }

    async fn save_pass(
        &self,
        interval: KlineInterval,
        candles: &[Candle],
        cursors: &[Cursor],
    ) -> Result<()> {
        if self.fail_saves.get() {
            return Err(anyhow!("memory store: save rejected"));
        }

        let mut tables = self.tables.borrow_mut();
        let tables = tables.entry(interval).or_default();

        let mut persisted = Vec::with_capacity(candles.len());
        for candle in candles {
            let key = (candle.symbol.clone(), candle.open_time);
            let id = tables
                .candles
                .get(&key)
                .map(|stored| stored.id)
                .unwrap_or(candle.id);

            tables.candles.insert(
                key,
                Candle {
                    id,
                    ..candle.clone()
                },
            );

            persisted.push(PersistedCandle {
                symbol: candle.symbol.clone(),
                open_time: candle.open_time,
                id,
            });
        }

        for cursor in repoint_cursors(cursors, &persisted) {
            tables.cursors.insert(cursor.symbol.clone(), cursor);
        }

        self.commits.set(self.commits.get() + 1);

        Ok(())
    }

    async fn get_inactive_symbols(&self, interval: KlineInterval) -> Result<Vec<Symbol>> {
        let symbols = self
            .cursors(interval)
            .into_iter()
            .filter(|cursor| !cursor.active)
            .map(|cursor| cursor.symbol)
            .collect();

        Ok(symbols)
    }

    async fn reactivate_symbols(
        &self,
        interval: KlineInterval,
        symbols: &[Symbol],
    ) -> Result<u64> {
        let mut tables = self.tables.borrow_mut();
        let Some(tables) = tables.get_mut(&interval) else {
            return Ok(0);
        };

        let mut affected = 0;
        for symbol in symbols {
            if let Some(cursor) = tables.cursors.get_mut(symbol) {
                if !cursor.active {
                    cursor.active = true;
                    affected += 1;
                }
            }
        }

        Ok(affected)
    }
}
