use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 滑动窗口内的连接尝试上限，只在熄屏时生效
#[derive(Debug, Clone)]
pub struct ConnectionAttemptLimiter {
    attempts: VecDeque<Instant>,
    window: Duration,
    max_attempts: usize,
}

impl ConnectionAttemptLimiter {
    pub fn new(window: Duration, max_attempts: usize) -> Self {
        Self {
            attempts: VecDeque::with_capacity(max_attempts + 1),
            window,
            max_attempts,
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.attempts.front() {
            if now.saturating_duration_since(*front) > self.window {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
    }

    /// 先淘汰窗口外的记录，再判断是否已达上限
    pub fn should_skip(&mut self, now: Instant) -> bool {
        self.evict(now);
        self.attempts.len() >= self.max_attempts
    }

    pub fn record(&mut self, now: Instant) {
        self.attempts.push_back(now);
        // 防止在从不调用 should_skip 的场景下无限增长
        while self.attempts.len() > self.max_attempts {
            self.attempts.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.attempts.clear();
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

impl Default for ConnectionAttemptLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(4 * 60), 6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps_at_six_per_window() {
        let mut limiter = ConnectionAttemptLimiter::default();
        let start = Instant::now();
        for i in 0..6 {
            let now = start + Duration::from_secs(i * 10);
            assert!(!limiter.should_skip(now));
            limiter.record(now);
        }
        assert!(limiter.should_skip(start + Duration::from_secs(60)));

        // 第一条记录离开窗口后放行
        assert!(!limiter.should_skip(start + Duration::from_secs(241)));
        assert_eq!(limiter.len(), 5);
    }

    #[test]
    fn test_clear_resets() {
        let mut limiter = ConnectionAttemptLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();
        limiter.record(now);
        assert!(limiter.should_skip(now));
        limiter.clear();
        assert!(!limiter.should_skip(now));
    }
}
