//! Per-socket inbound rate limiting (§4.E: 10 client-originated events per
//! second). A sliding window of timestamps rather than a token bucket —
//! simple, and inbound traffic on this channel is rare (clients mostly just
//! receive), so the extra bookkeeping a bucket buys isn't worth it here.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    window: Duration,
    max_events: usize,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn per_second(max_events: usize) -> Self {
        Self {
            window: Duration::from_secs(1),
            max_events,
            timestamps: VecDeque::with_capacity(max_events + 1),
        }
    }

    /// Records one inbound event now and reports whether it is within the
    /// limit. Callers over the limit should drop the event and notify the
    /// client rather than act on it.
    pub fn check(&mut self) -> bool {
        let now = Instant::now();
        while let Some(&front) = self.timestamps.front() {
            if now.duration_since(front) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }

        if self.timestamps.len() >= self.max_events {
            return false;
        }
        self.timestamps.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let mut limiter = RateLimiter::per_second(3);
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(!limiter.check());
    }
}
