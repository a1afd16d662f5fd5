use crate::transport::ApiResponse;

use reqwest::StatusCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const RATE_LIMIT_RESET: &str = "X-Rate-Limit-Reset";
pub const RATE_LIMIT_REMAINING: &str = "X-Rate-Limit-Remaining";

/// Source of wall-clock time and sleeps, swapped out in tests.
pub trait Clock: Send + Sync + 'static + Clone {
    /// Seconds since the unix epoch.
    fn now_epoch(&self) -> u64;

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now_epoch(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Rate-limit handling shared by every vendor client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Added on top of the advertised reset time.
    pub reset_margin: Duration,
    /// Assumed reset window when the server sends none.
    pub fallback_reset: Duration,
    /// Below this many remaining calls every response is followed by a short pause.
    pub low_watermark: u64,
    pub preemptive_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            reset_margin: Duration::from_secs(1),
            fallback_reset: Duration::from_secs(60),
            low_watermark: 10,
            preemptive_pause: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn is_rate_limited(response: &ApiResponse) -> bool {
        response.status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Time to wait after a 429, never negative.
    pub fn wait_for(&self, response: &ApiResponse, now_epoch: u64) -> Duration {
        let reset = response
            .header_u64(RATE_LIMIT_RESET)
            .unwrap_or_else(|| now_epoch + self.fallback_reset.as_secs());
        let resume_at = Duration::from_secs(reset) + self.reset_margin;
        resume_at.saturating_sub(Duration::from_secs(now_epoch))
    }

    /// Pause to apply after a non-429 response, if the remaining budget is low.
    pub fn preemptive_wait(&self, response: &ApiResponse) -> Option<Duration> {
        response
            .header_u64(RATE_LIMIT_REMAINING)
            .filter(|remaining| *remaining < self.low_watermark)
            .map(|_| self.preemptive_pause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited(reset: Option<u64>) -> ApiResponse {
        let response = ApiResponse::new(StatusCode::TOO_MANY_REQUESTS);
        match reset {
            Some(reset) => response.with_header(RATE_LIMIT_RESET, reset.to_string()),
            None => response,
        }
    }

    #[test]
    fn waits_until_reset_plus_margin() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.wait_for(&limited(Some(1_002)), 1_000),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn reset_in_the_past_means_no_wait() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.wait_for(&limited(Some(900)), 1_000), Duration::ZERO);
    }

    #[test]
    fn missing_reset_falls_back_to_a_minute() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.wait_for(&limited(None), 1_000), Duration::from_secs(61));
    }

    #[test]
    fn low_remaining_budget_triggers_pause() {
        let policy = RetryPolicy::default();
        let low = ApiResponse::new(StatusCode::OK).with_header(RATE_LIMIT_REMAINING, "9");
        let fine = ApiResponse::new(StatusCode::OK).with_header(RATE_LIMIT_REMAINING, "10");
        assert_eq!(policy.preemptive_wait(&low), Some(Duration::from_millis(500)));
        assert_eq!(policy.preemptive_wait(&fine), None);
        assert_eq!(policy.preemptive_wait(&ApiResponse::new(StatusCode::OK)), None);
    }
}
