use crate::request_budget::RequestBudget;
use anyhow::Result;
use spot_loader_base::{KlineInterval, Symbol};
use spot_loader_database::Cursor;
use spot_loader_exchange::KlineSource;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub symbol: Symbol,  // 交易对
    pub start_time: i64, // 本轮请求的开始时间 (毫秒)
}

impl WorkItem {
    pub fn new(symbol: impl Into<Symbol>, start_time: i64) -> Self {
        WorkItem {
            symbol: symbol.into(),
            start_time,
        }
    }
}

/// Ordered `(symbol, start_time)` pairs for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkList {
    items: Vec<WorkItem>,
}

impl WorkList {
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    // 本轮预期能拿到数据的交易对数量
    pub fn active_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn push(&mut self, item: WorkItem) {
        self.items.push(item);
    }
}

/// Split of the requested symbols before any upstream lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub known: WorkList,      // 已有游标且活跃, 从下一个周期继续
    pub unknown: Vec<Symbol>, // 没有游标, 需要查询最早时间
    pub inactive: usize,      // 已有游标但不活跃, 本轮跳过
}

// 重复的交易对只保留第一次出现的位置
pub fn partition(symbols: &[Symbol], cursors: &[Cursor], interval: KlineInterval) -> Partition {
    let cursors = cursors
        .iter()
        .map(|cursor| (&cursor.symbol, cursor))
        .collect::<HashMap<_, _>>();

    let mut seen = HashSet::new();
    let mut partition = Partition::default();

    for symbol in symbols {
        if !seen.insert(symbol) {
            continue;
        }

        match cursors.get(symbol) {
            Some(cursor) if cursor.active => {
                let open_time = cursor.open_time.timestamp_millis();
                partition.known.push(WorkItem::new(
                    symbol,
                    interval.next_bucket_start(open_time),
                ));
            }
            Some(_) => partition.inactive += 1,
            None => partition.unknown.push(symbol.clone()),
        }
    }

    partition
}

/// Builds the work list of a pass: known active symbols resume one bucket after their
/// cursor, new symbols start at their earliest upstream kline.
pub async fn resolve<S: KlineSource>(
    source: &S,
    budget: &mut RequestBudget,
    symbols: &[Symbol],
    cursors: &[Cursor],
    interval: KlineInterval,
) -> Result<WorkList> {
    let Partition {
        known: mut work,
        unknown,
        inactive,
    } = partition(symbols, cursors, interval);

    tracing::debug!(
        known = work.active_count(),
        unknown = unknown.len(),
        inactive,
        "partitioned symbols"
    );

    for symbol in unknown {
        let earliest = source.fetch_earliest_timestamp(&symbol, interval).await;
        budget.record_and_wait().await;

        match earliest {
            Ok(Some(start_time)) => work.push(WorkItem::new(symbol, start_time)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(symbol = %symbol, "failed to fetch earliest timestamp: {:#}", e);
            }
        }
    }

    Ok(work)
}
