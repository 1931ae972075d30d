use std::time::Duration;

pub const DEFAULT_REQUEST_LIMIT: u64 = 1000;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Counts upstream requests for the lifetime of a loader and asks for a pause
/// every `limit` requests.
#[derive(Debug, Clone)]
pub struct RequestBudget {
    limit: u64,
    cooldown: Duration,
    count: u64,
}

impl RequestBudget {
    pub fn new(limit: u64, cooldown: Duration) -> Self {
        RequestBudget {
            limit,
            cooldown,
            count: 0,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    // 记录一次请求, 到达上限的整数倍时返回需要暂停的时长
    pub fn record(&mut self) -> Option<Duration> {
        self.count += 1;

        if self.limit > 0 && self.count % self.limit == 0 {
            Some(self.cooldown)
        } else {
            None
        }
    }

    pub async fn record_and_wait(&mut self) {
        if let Some(cooldown) = self.record() {
            tracing::info!(
                requests = self.count,
                "request limit reached, cooling down for {}s",
                cooldown.as_secs()
            );
            tokio::time::sleep(cooldown).await;
        }
    }
}

impl Default for RequestBudget {
    fn default() -> Self {
        RequestBudget::new(DEFAULT_REQUEST_LIMIT, DEFAULT_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_every_limit_requests() {
        let mut budget = RequestBudget::new(3, Duration::from_secs(60));

        let pauses = (0..7).map(|_| budget.record()).collect::<Vec<_>>();

        assert_eq!(
            pauses,
            vec![
                None,
                None,
                Some(Duration::from_secs(60)),
                None,
                None,
                Some(Duration::from_secs(60)),
                None
            ]
        );
        assert_eq!(budget.count(), 7);
    }

    #[test]
    fn test_zero_limit_never_pauses() {
        let mut budget = RequestBudget::new(0, Duration::from_secs(60));

        assert!((0..10).all(|_| budget.record().is_none()));
    }

    #[tokio::test]
    async fn test_record_and_wait() {
        let mut budget = RequestBudget::new(1, Duration::ZERO);

        budget.record_and_wait().await;
        budget.record_and_wait().await;

        assert_eq!(budget.count(), 2);
    }
}
