/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Longest window honoured, whatever the server asks for.
pub const MAX_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Returned when a fetch is cancelled while waiting or in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fetch cancelled")
    }
}

impl std::error::Error for Cancelled {}

pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Cancelled>().is_some()
}

pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancel.cancelled() => Err(Cancelled.into()),
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RateLimitSettings {
    /// Pause between unthrottled requests, keeps the CDN burst limiter quiet.
    pub min_interval: Duration,
    /// Window assumed when the server throttles without saying for how long.
    pub default_window: Duration,
    pub safety_margin: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(50),
            default_window: Duration::from_secs(60),
            safety_margin: Duration::from_secs(2),
        }
    }
}

/// What a response says about the rate limit, in order of precedence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitSignal {
    RetryAfter(Duration),
    TooManyRequests,
    QuotaExhausted,
    Clear,
}

impl RateLimitSignal {
    /// True when the response must be discarded and the request sent again.
    pub fn must_retry(self) -> bool {
        matches!(self, Self::RetryAfter(_) | Self::TooManyRequests)
    }
}

pub fn classify_response(status: StatusCode, headers: &HeaderMap) -> RateLimitSignal {
    if let Some(delta) = retry_after(headers) {
        return RateLimitSignal::RetryAfter(delta);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return RateLimitSignal::TooManyRequests;
    }
    let remaining = headers
        .get(RATE_LIMIT_REMAINING)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok());
    match remaining {
        Some(n) if n <= 0 => RateLimitSignal::QuotaExhausted,
        _ => RateLimitSignal::Clear,
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = httpdate::parse_http_date(raw).ok()?;
    Some(at.duration_since(SystemTime::now()).unwrap_or_default())
}

#[derive(Debug)]
struct RateLimitState {
    limited: bool,
    limit_ends_at: Instant,
}

/// Shared rate-limit window. Every request waits on [`RateLimiter::await_clearance`]
/// and the transport updates the window after inspecting each response.
#[derive(Debug)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    state: Mutex<RateLimitState>,
    hits: AtomicU64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitSettings::default())
    }
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(RateLimitState {
                limited: false,
                limit_ends_at: Instant::now(),
            }),
            hits: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    pub fn is_limited(&self) -> bool {
        self.state.lock().unwrap().limited
    }

    pub fn limit_ends_at(&self) -> Option<Instant> {
        let st = self.state.lock().unwrap();
        st.limited.then_some(st.limit_ends_at)
    }

    /// Number of responses that forced a retry.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub async fn await_clearance<F>(&self, cancel: &CancellationToken, on_status: F) -> Result<()>
    where
        F: Fn(bool),
    {
        let mut was_limited = false;
        let mut announced = false;
        loop {
            // Another holder may extend the window while we sleep.
            let remaining = {
                let mut st = self.state.lock().unwrap();
                if !st.limited {
                    None
                } else {
                    was_limited = true;
                    let left = st.limit_ends_at.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        st.limited = false;
                        None
                    } else {
                        Some(left)
                    }
                }
            };
            let Some(remaining) = remaining else {
                break;
            };
            if !announced {
                on_status(true);
                announced = true;
            }
            debug!("rate limited, waiting {}ms", remaining.as_millis());
            sleep_or_cancel(remaining, cancel).await?;
        }

        if !was_limited {
            return sleep_or_cancel(self.settings.min_interval, cancel).await;
        }
        on_status(false);
        Ok(())
    }

    /// The current request was rejected: it must wait `delta` plus the margin.
    pub fn block_for(&self, delta: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.set_limited(delta);
    }

    /// The current response is fine but the quota is spent: limit the next call.
    pub fn arm_next(&self) {
        self.set_limited(self.settings.default_window);
    }

    fn set_limited(&self, delta: Duration) {
        let delta = delta.min(MAX_WINDOW) + self.settings.safety_margin.min(MAX_WINDOW);
        let now = Instant::now();
        let ends = now.checked_add(delta).unwrap_or(now + MAX_WINDOW);
        let mut st = self.state.lock().unwrap();
        if !st.limited || st.limit_ends_at < ends {
            st.limit_ends_at = ends;
        }
        st.limited = true;
    }

    /// Applies a response's signal to the window and reports whether to retry.
    pub fn observe(&self, signal: RateLimitSignal) -> bool {
        match signal {
            RateLimitSignal::RetryAfter(delta) => {
                warn!("rate limited: retry after {}s", delta.as_secs());
                self.block_for(delta);
            }
            RateLimitSignal::TooManyRequests => {
                warn!("rate limited: 429 without retry-after");
                self.block_for(self.settings.default_window);
            }
            RateLimitSignal::QuotaExhausted => {
                debug!("rate limit quota spent, next request will wait");
                self.arm_next();
            }
            RateLimitSignal::Clear => {}
        }
        signal.must_retry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        h
    }

    #[test]
    fn retry_after_wins_over_status() {
        let h = headers(&[("retry-after", "5"), (RATE_LIMIT_REMAINING, "0")]);
        assert_eq!(
            classify_response(StatusCode::TOO_MANY_REQUESTS, &h),
            RateLimitSignal::RetryAfter(Duration::from_secs(5))
        );
    }

    #[test]
    fn classifies_quota_and_clear() {
        assert_eq!(
            classify_response(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new()),
            RateLimitSignal::TooManyRequests
        );
        assert_eq!(
            classify_response(StatusCode::OK, &headers(&[(RATE_LIMIT_REMAINING, "0")])),
            RateLimitSignal::QuotaExhausted
        );
        assert_eq!(
            classify_response(StatusCode::OK, &headers(&[(RATE_LIMIT_REMAINING, "-1")])),
            RateLimitSignal::QuotaExhausted
        );
        assert_eq!(
            classify_response(StatusCode::OK, &headers(&[(RATE_LIMIT_REMAINING, "12")])),
            RateLimitSignal::Clear
        );
        assert_eq!(
            classify_response(StatusCode::OK, &headers(&[(RATE_LIMIT_REMAINING, "lots")])),
            RateLimitSignal::Clear
        );
    }

    #[test]
    fn retry_after_accepts_http_date() {
        let at = SystemTime::now() + Duration::from_secs(30);
        let date = httpdate::fmt_http_date(at);
        let h = headers(&[("retry-after", date.as_str())]);
        match classify_response(StatusCode::SERVICE_UNAVAILABLE, &h) {
            RateLimitSignal::RetryAfter(d) => {
                assert!(d <= Duration::from_secs(30));
                assert!(d >= Duration::from_secs(27));
            }
            other => panic!("unexpected signal {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unthrottled_requests_are_spaced() {
        let limiter = RateLimiter::default();
        let calls = Mutex::new(Vec::new());
        let start = Instant::now();
        limiter
            .await_clearance(&CancellationToken::new(), |w| calls.lock().unwrap().push(w))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_delays_next_request_with_margin() {
        let limiter = RateLimiter::default();
        let h = headers(&[("retry-after", "5")]);
        let start = Instant::now();
        assert!(limiter.observe(classify_response(StatusCode::TOO_MANY_REQUESTS, &h)));
        assert!(limiter.limit_ends_at().unwrap() >= start + Duration::from_secs(7));

        let calls = Mutex::new(Vec::new());
        limiter
            .await_clearance(&CancellationToken::new(), |w| calls.lock().unwrap().push(w))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(7));
        assert_eq!(*calls.lock().unwrap(), [true, false]);
        assert!(!limiter.is_limited());
        assert_eq!(limiter.hits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn too_many_requests_backs_off_a_full_window() {
        let limiter = RateLimiter::default();
        let start = Instant::now();
        assert!(limiter.observe(RateLimitSignal::TooManyRequests));
        limiter
            .await_clearance(&CancellationToken::new(), |_| {})
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(62));
    }

    #[tokio::test(start_paused = true)]
    async fn spent_quota_limits_only_the_next_call() {
        let limiter = RateLimiter::default();
        let start = Instant::now();
        assert!(!limiter.observe(RateLimitSignal::QuotaExhausted));
        assert!(limiter.is_limited());
        assert_eq!(limiter.hits(), 0);
        limiter
            .await_clearance(&CancellationToken::new(), |_| {})
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(62));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_window_clears_without_waiting() {
        let limiter = RateLimiter::new(RateLimitSettings {
            min_interval: Duration::from_millis(50),
            default_window: Duration::ZERO,
            safety_margin: Duration::ZERO,
        });
        limiter.arm_next();
        tokio::time::advance(Duration::from_millis(1)).await;
        let calls = Mutex::new(Vec::new());
        limiter
            .await_clearance(&CancellationToken::new(), |w| calls.lock().unwrap().push(w))
            .await
            .unwrap();
        assert_eq!(*calls.lock().unwrap(), [false]);
        assert!(!limiter.is_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_wait() {
        let limiter = RateLimiter::default();
        limiter.block_for(Duration::from_secs(600));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let err = limiter.await_clearance(&cancel, |_| {}).await.unwrap_err();
        assert!(is_cancelled(&err));
        assert!(limiter.is_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn absurd_retry_after_is_capped() {
        let limiter = RateLimiter::default();
        let h = headers(&[("retry-after", "18446744073709551615")]);
        let start = Instant::now();
        assert!(limiter.observe(classify_response(StatusCode::TOO_MANY_REQUESTS, &h)));
        let ends = limiter.limit_ends_at().unwrap();
        assert!(ends <= start + MAX_WINDOW + Duration::from_secs(2));
        assert!(ends >= start + MAX_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn window_extended_during_wait_is_honoured() {
        let limiter = std::sync::Arc::new(RateLimiter::default());
        let start = Instant::now();
        limiter.block_for(Duration::from_secs(5));
        let waiter = tokio::spawn({
            let limiter = limiter.clone();
            async move {
                limiter
                    .await_clearance(&CancellationToken::new(), |_| {})
                    .await
                    .unwrap();
                Instant::now()
            }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        limiter.block_for(Duration::from_secs(60));

        let cleared_at = waiter.await.unwrap();
        assert!(cleared_at - start >= Duration::from_secs(63));
        assert!(!limiter.is_limited());
        assert_eq!(limiter.hits(), 2);
    }
}
