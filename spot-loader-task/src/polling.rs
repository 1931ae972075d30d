use crate::pass_outcome::PassOutcome;
use rand::Rng;
use spot_loader_base::KlineInterval;
use std::{fmt, time::Duration};

const CATCH_UP_MIN_SECS: u64 = 1;
const CATCH_UP_MAX_SECS: u64 = 5;
const STEADY_JITTER_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollingMode {
    // 还有积压, 尽快进入下一轮
    #[default]
    CatchUp,
    // 已经追上, 按周期的四分之一轮询
    Steady,
}

impl fmt::Display for PollingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollingMode::CatchUp => write!(f, "catch-up"),
            PollingMode::Steady => write!(f, "steady"),
        }
    }
}

/// Picks the pause between passes from the outcome of the last one.
#[derive(Debug, Clone)]
pub struct PollingController {
    interval: KlineInterval,
    mode: PollingMode,
}

impl PollingController {
    pub fn new(interval: KlineInterval) -> Self {
        PollingController {
            interval,
            mode: PollingMode::default(),
        }
    }

    pub fn mode(&self) -> PollingMode {
        self.mode
    }

    pub fn observe(&mut self, outcome: &PassOutcome) -> PollingMode {
        self.mode = if outcome.is_complete() {
            PollingMode::Steady
        } else {
            PollingMode::CatchUp
        };

        self.mode
    }

    // 当前模式下延迟的取值范围 (秒, 闭区间)
    pub fn delay_bounds(&self) -> (u64, u64) {
        match self.mode {
            PollingMode::CatchUp => (CATCH_UP_MIN_SECS, CATCH_UP_MAX_SECS),
            PollingMode::Steady => {
                let base = self.interval.steady_poll_secs();
                (base, base + STEADY_JITTER_SECS)
            }
        }
    }

    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (min, max) = self.delay_bounds();
        Duration::from_secs(rng.gen_range(min..=max))
    }
}
