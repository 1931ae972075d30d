use spot_loader_base::now_millis;
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

/// Source of "now" for closed-bucket and inactivity checks, in epoch milliseconds.
///
/// `Manual` clones share the same instant, so a test can keep a handle and move time
/// forward while the loader owns its copy.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Manual(Arc<AtomicI64>),
}

impl Clock {
    pub fn manual(now: i64) -> Self {
        Clock::Manual(Arc::new(AtomicI64::new(now)))
    }

    pub fn now(&self) -> i64 {
        match self {
            Clock::System => now_millis(),
            Clock::Manual(now) => now.load(Ordering::SeqCst),
        }
    }

    // 系统时钟忽略
    pub fn set(&self, now: i64) {
        if let Clock::Manual(current) = self {
            current.store(now, Ordering::SeqCst);
        }
    }

    pub fn advance(&self, millis: i64) {
        if let Clock::Manual(current) = self {
            current.fetch_add(millis, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = Clock::manual(1714136400000);
        let handle = clock.clone();

        handle.advance(60_000);
        assert_eq!(clock.now(), 1714136460000);

        handle.set(1714140000000);
        assert_eq!(clock.now(), 1714140000000);
    }

    #[test]
    fn test_system_clock_ignores_set() {
        let clock = Clock::default();
        clock.set(0);
        assert!(clock.now() > 0);
    }
}
