//! Fixed-window rate limiting keyed by client IP.
//!
//! Deliberately a fixed-window counter, not a sliding log: it admits brief
//! bursts at window boundaries, which is acceptable for its protective
//! role in front of the read-heavy search endpoints. Every admitted
//! response carries `X-RateLimit-Limit` and `X-RateLimit-Remaining`;
//! rejections are `429` with a `Retry-After` header.
//!
//! Windows live in a `DashMap` so concurrent requests for the same key
//! serialize on that key's shard while unrelated clients never contend on
//! a global lock. A window is replaced whole when it expires, never
//! partially updated.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::state::AppState;

use super::client_ip::extract_client_ip;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Admitted; `remaining` is the quota left in the current window.
    Admitted { limit: u32, remaining: u32 },
    /// Rejected; retry after the full window length.
    Rejected { limit: u32, retry_after: Duration },
}

/// Per-key counter window.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started_at: Instant,
}

/// Fixed-window admission control over a concurrent per-key map.
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<IpAddr, Window>,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limit: config.limit,
            window: config.window,
            windows: DashMap::new(),
        }
    }

    /// Check one request for `key` at time `now`.
    ///
    /// Starts a fresh window (count 1) when none exists or the current one
    /// has expired; otherwise increments the counter until the limit is
    /// reached.
    pub fn check(&self, key: IpAddr, now: Instant) -> RateLimitDecision {
        let mut entry = self.windows.entry(key).or_insert(Window {
            count: 0,
            started_at: now,
        });
        let window = entry.value_mut();

        if now.saturating_duration_since(window.started_at) >= self.window {
            // Expired: replace the window whole.
            *window = Window {
                count: 1,
                started_at: now,
            };
            return RateLimitDecision::Admitted {
                limit: self.limit,
                remaining: self.limit.saturating_sub(1),
            };
        }

        if window.count < self.limit {
            window.count += 1;
            RateLimitDecision::Admitted {
                limit: self.limit,
                remaining: self.limit - window.count,
            }
        } else {
            RateLimitDecision::Rejected {
                limit: self.limit,
                retry_after: self.window,
            }
        }
    }

    /// Drop windows that expired before `now`. Returns how many were
    /// removed. Run periodically so the key space has a lifecycle.
    pub fn prune(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.window;
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started_at) < window);
        before - self.windows.len()
    }

    /// Number of live windows (for observability).
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Axum middleware enforcing the limiter on the wrapped routes.
///
/// Requests without a resolvable client IP share one bucket under the
/// unspecified address rather than bypassing the limiter.
pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = extract_client_ip(request.headers()).unwrap_or_else(|| {
        tracing::debug!("no client IP header; rate limiting under shared key");
        IpAddr::from([0, 0, 0, 0])
    });

    match state.limiter().check(key, Instant::now()) {
        RateLimitDecision::Admitted { limit, remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", header_number(u64::from(limit)));
            headers.insert("x-ratelimit-remaining", header_number(u64::from(remaining)));
            response
        }
        RateLimitDecision::Rejected { limit, retry_after } => {
            tracing::warn!(client = %key, "rate limit exceeded");
            let mut response = AppError::RateLimited {
                retry_after: retry_after.as_secs(),
            }
            .into_response();
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", header_number(u64::from(limit)));
            headers.insert("x-ratelimit-remaining", header_number(0));
            response
        }
    }
}

fn header_number(value: u64) -> HeaderValue {
    HeaderValue::from_str(&value.to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("0"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, window_secs: u64) -> FixedWindowLimiter {
        FixedWindowLimiter::new(RateLimitConfig {
            limit,
            window: Duration::from_secs(window_secs),
        })
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([1, 2, 3, last])
    }

    #[test]
    fn test_quota_counts_down_then_rejects() {
        let limiter = limiter(10, 60);
        let now = Instant::now();

        for expected_remaining in (0..10).rev() {
            let decision = limiter.check(ip(4), now);
            assert_eq!(
                decision,
                RateLimitDecision::Admitted {
                    limit: 10,
                    remaining: expected_remaining,
                }
            );
        }

        // The 11th request within the window is rejected with the full
        // window as the retry hint.
        assert_eq!(
            limiter.check(ip(4), now),
            RateLimitDecision::Rejected {
                limit: 10,
                retry_after: Duration::from_secs(60),
            }
        );
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let limiter = limiter(2, 60);
        let start = Instant::now();

        assert!(matches!(
            limiter.check(ip(1), start),
            RateLimitDecision::Admitted { remaining: 1, .. }
        ));
        assert!(matches!(
            limiter.check(ip(1), start),
            RateLimitDecision::Admitted { remaining: 0, .. }
        ));
        assert!(matches!(
            limiter.check(ip(1), start),
            RateLimitDecision::Rejected { .. }
        ));

        // One full window later the key starts over at count 1.
        let later = start + Duration::from_secs(60);
        assert_eq!(
            limiter.check(ip(1), later),
            RateLimitDecision::Admitted {
                limit: 2,
                remaining: 1,
            }
        );
    }

    #[test]
    fn test_keys_do_not_interfere() {
        let limiter = limiter(1, 60);
        let now = Instant::now();

        assert!(matches!(
            limiter.check(ip(1), now),
            RateLimitDecision::Admitted { .. }
        ));
        assert!(matches!(
            limiter.check(ip(1), now),
            RateLimitDecision::Rejected { .. }
        ));

        // A different client is untouched by the first key's exhaustion.
        assert!(matches!(
            limiter.check(ip(2), now),
            RateLimitDecision::Admitted { .. }
        ));
    }

    #[test]
    fn test_prune_drops_only_expired_windows() {
        let limiter = limiter(5, 60);
        let start = Instant::now();

        limiter.check(ip(1), start);
        limiter.check(ip(2), start + Duration::from_secs(59));
        assert_eq!(limiter.tracked_keys(), 2);

        let removed = limiter.prune(start + Duration::from_secs(61));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
