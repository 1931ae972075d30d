use crate::pass_outcome::PassOutcome;
use anyhow::Result;
use spot_loader_base::KlineInterval;
use spot_loader_database::{Candle, Cursor, KlineStore};
use std::time::Duration;

/// Candles and cursors gathered over one pass, written in a single commit.
#[derive(Debug, Default)]
pub struct PassBatch {
    candles: Vec<Candle>,
    cursors: Vec<Cursor>,
    active_count: usize,
    symbols_with_data: usize,
    full_pages: usize,
}

impl PassBatch {
    pub fn new(active_count: usize) -> Self {
        PassBatch {
            active_count,
            ..Default::default()
        }
    }

    pub fn add(&mut self, candles: Vec<Candle>, cursor: Option<Cursor>, full_page: bool) {
        if candles.is_empty() {
            return;
        }

        self.symbols_with_data += 1;
        if full_page {
            self.full_pages += 1;
        }

        self.candles.extend(candles);
        self.cursors.extend(cursor);
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn cursors(&self) -> &[Cursor] {
        &self.cursors
    }

    pub fn outcome(&self, elapsed: Duration) -> PassOutcome {
        PassOutcome {
            active_count: self.active_count,
            symbols_with_data: self.symbols_with_data,
            candles: self.candles.len(),
            cursors: self.cursors.len(),
            full_pages: self.full_pages,
            elapsed,
        }
    }

    pub async fn commit<T: KlineStore>(
        self,
        store: &T,
        interval: KlineInterval,
        elapsed: Duration,
    ) -> Result<PassOutcome> {
        if !self.candles.is_empty() || !self.cursors.is_empty() {
            store
                .save_pass(interval, &self.candles, &self.cursors)
                .await?;
        }

        Ok(self.outcome(elapsed))
    }
}
