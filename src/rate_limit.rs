use axum::http::HeaderMap;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;

// Rate limit entry - tracks requests per IP/key
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: Instant,
}

impl RateLimitEntry {
    fn is_live(&self, now: Instant) -> bool {
        now <= self.reset_time
    }
}

/// Fixed-window request counter keyed by client identifier.
///
/// Constructed once at startup and shared through `Arc`. Expired entries are
/// dropped by the sweeper task started with [`RateLimiter::spawn_sweeper`];
/// [`RateLimiter::shutdown`] stops it and clears the map.
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    max_requests: u32,
    window: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests,
            window,
            sweeper: Mutex::new(None),
        }
    }

    // Record a request, returns false when the identifier is over its limit
    pub fn check(&self, identifier: &str) -> bool {
        let now = Instant::now();

        let mut entry = self
            .entries
            .entry(identifier.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                reset_time: now + self.window,
            });

        // window expired (or brand new)? start over
        if entry.count == 0 || !entry.is_live(now) {
            entry.count = 1;
            entry.reset_time = now + self.window;
            return true;
        }

        if entry.count >= self.max_requests {
            return false;
        }

        entry.count += 1;
        true
    }

    pub fn remaining(&self, identifier: &str) -> u32 {
        let now = Instant::now();
        match self.entries.get(identifier) {
            Some(entry) if entry.is_live(now) => self.max_requests.saturating_sub(entry.count),
            _ => self.max_requests,
        }
    }

    /// Time left in the identifier's current window, zero when none is live.
    pub fn reset_time(&self, identifier: &str) -> Duration {
        let now = Instant::now();
        match self.entries.get(identifier) {
            Some(entry) if entry.is_live(now) => entry.reset_time.saturating_duration_since(now),
            _ => Duration::ZERO,
        }
    }

    // Drop every entry whose window has elapsed
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start the periodic sweep. Calling it again replaces the previous sweeper.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = weak.upgrade() else {
                    break;
                };
                let before = limiter.len();
                limiter.sweep();
                let removed = before.saturating_sub(limiter.len());
                if removed > 0 {
                    log::debug!("Rate limiter sweep removed {} expired entries", removed);
                }
            }
        });

        if let Ok(mut slot) = self.sweeper.lock() {
            if let Some(old) = slot.replace(handle) {
                old.abort();
            }
        }
    }

    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.sweeper.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        self.entries.clear();
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.sweeper.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Pick the client address out of proxy headers, `"unknown"` when absent.
pub fn client_ip(headers: &HeaderMap) -> String {
    // x-forwarded-for can hold a chain, the first hop is the client
    if let Some(forwarded) = header_value(headers, "x-forwarded-for") {
        let first = forwarded.split(',').next().unwrap_or("").trim();
        if first.is_empty() {
            return "unknown".to_string();
        }
        return first.to_string();
    }

    for name in ["x-real-ip", "cf-connecting-ip"] {
        if let Some(ip) = header_value(headers, name) {
            return ip.trim().to_string();
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn allows_up_to_max_then_denies() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for n in 1..=3 {
            assert!(limiter.check("10.0.0.1"), "request {} should pass", n);
            assert_eq!(limiter.remaining("10.0.0.1"), 3 - n);
        }
        assert!(!limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        assert_eq!(limiter.remaining("10.0.0.1"), 0);
    }

    #[test]
    fn unknown_identifier_has_full_quota() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        assert_eq!(limiter.remaining("nobody"), 5);
        assert_eq!(limiter.reset_time("nobody"), Duration::ZERO);
    }

    #[test]
    fn identifiers_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
        assert_eq!(limiter.remaining("a"), 0);
        assert_eq!(limiter.remaining("b"), 0);
        assert_eq!(limiter.remaining("c"), 1);
    }

    #[test]
    fn expired_window_resets_count() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50));
        assert!(limiter.check("ip"));
        assert!(limiter.check("ip"));
        assert!(!limiter.check("ip"));

        std::thread::sleep(Duration::from_millis(80));

        assert_eq!(limiter.remaining("ip"), 2);
        assert!(limiter.check("ip"));
        assert_eq!(limiter.remaining("ip"), 1);
    }

    #[test]
    fn reset_time_counts_down_within_window() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        limiter.check("ip");
        let left = limiter.reset_time("ip");
        assert!(left > Duration::from_secs(59));
        assert!(left <= Duration::from_secs(60));
    }

    #[test]
    fn denied_request_does_not_extend_window() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.check("ip");
        let before = limiter.reset_time("ip");
        assert!(!limiter.check("ip"));
        assert!(limiter.reset_time("ip") <= before);
    }

    #[test]
    fn sweep_removes_only_expired() {
        let limiter = RateLimiter::new(10, Duration::from_millis(40));
        limiter.check("old");
        std::thread::sleep(Duration::from_millis(60));
        limiter.check("fresh");
        limiter.sweep();
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.remaining("fresh"), 9);
    }

    #[tokio::test]
    async fn sweeper_task_clears_expired_entries() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_millis(20)));
        limiter.check("key1");
        limiter.check("key2");
        assert_eq!(limiter.len(), 2);

        limiter.spawn_sweeper(Duration::from_millis(30));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(limiter.is_empty());
        limiter.shutdown();
    }

    #[tokio::test]
    async fn shutdown_clears_state() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));
        limiter.spawn_sweeper(Duration::from_secs(300));
        limiter.check("key");
        limiter.shutdown();
        assert!(limiter.is_empty());
        assert!(limiter.sweeper.lock().unwrap().is_none());
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let h = headers(&[("x-forwarded-for", "1.2.3.4, 5.6.7.8")]);
        assert_eq!(client_ip(&h), "1.2.3.4");
    }

    #[test]
    fn forwarded_for_wins_over_other_headers() {
        let h = headers(&[
            ("x-forwarded-for", " 9.9.9.9 "),
            ("x-real-ip", "1.1.1.1"),
            ("cf-connecting-ip", "2.2.2.2"),
        ]);
        assert_eq!(client_ip(&h), "9.9.9.9");
    }

    #[test]
    fn falls_back_through_real_ip_and_cloudflare() {
        let h = headers(&[("x-real-ip", " 1.1.1.1"), ("cf-connecting-ip", "2.2.2.2")]);
        assert_eq!(client_ip(&h), "1.1.1.1");

        let h = headers(&[("cf-connecting-ip", "2.2.2.2")]);
        assert_eq!(client_ip(&h), "2.2.2.2");
    }

    #[test]
    fn blank_forwarded_for_is_unknown() {
        let h = headers(&[("x-forwarded-for", " , 5.6.7.8"), ("x-real-ip", "1.1.1.1")]);
        assert_eq!(client_ip(&h), "unknown");
    }

    #[test]
    fn no_headers_is_unknown() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
