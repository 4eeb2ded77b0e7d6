use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{Duration, interval};

/// Render service url plus the health flag the checker and the engine flip.
pub struct Backend {
    pub url: String,
    healthy: AtomicBool,
}

impl Backend {
    pub fn new(url: String) -> Self {
        Self {
            url,
            healthy: AtomicBool::new(true),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

pub struct LoadBalancer {
    backends: Vec<Arc<Backend>>,
    current: AtomicUsize,
}

impl LoadBalancer {
    /// Build from comma-separated urls, e.g. `"localhost:8000, render-2:8000"`.
    /// Urls without a scheme get `http://`. Returns `None` when the list is empty.
    pub fn new(backends_str: &str) -> Option<Self> {
        let backends: Vec<Arc<Backend>> = backends_str
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|url| {
                let full_url = if url.starts_with("http") {
                    url.trim_end_matches('/').to_string()
                } else {
                    format!("http://{}", url.trim_end_matches('/'))
                };
                Arc::new(Backend::new(full_url))
            })
            .collect();

        if backends.is_empty() {
            return None;
        }

        log::info!("Render pool initialized with {} backends", backends.len());
        for (i, b) in backends.iter().enumerate() {
            log::info!("  [{}] {}", i + 1, b.url);
        }

        Some(Self {
            backends,
            current: AtomicUsize::new(0),
        })
    }

    // round-robin, skipping unhealthy backends
    pub fn get_backend(&self) -> Option<Arc<Backend>> {
        let len = self.backends.len();
        let start = self.current.fetch_add(1, Ordering::Relaxed) % len;

        for i in 0..len {
            let backend = &self.backends[(start + i) % len];
            if backend.is_healthy() {
                return Some(Arc::clone(backend));
            }
        }
        None
    }

    pub fn all_backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }
}

/// Probe every backend's `/health` on a fixed interval and flip its flag.
pub async fn health_checker(
    load_balancer: Arc<LoadBalancer>,
    client: reqwest::Client,
    check_interval: Duration,
) {
    let mut interval = interval(check_interval);

    log::info!("Backend health checker started (interval: {:?})", check_interval);

    loop {
        interval.tick().await;

        for backend in load_balancer.all_backends() {
            let url = format!("{}/health", backend.url);
            let was_healthy = backend.is_healthy();

            let is_healthy = match client.get(&url).timeout(Duration::from_secs(5)).send().await {
                Ok(res) => res.status().is_success(),
                Err(_) => false,
            };
            backend.set_healthy(is_healthy);

            if was_healthy != is_healthy {
                if is_healthy {
                    log::info!("Backend {} is now healthy", backend.url);
                } else {
                    log::warn!("Backend {} is now unhealthy", backend.url);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_urls() {
        let lb = LoadBalancer::new("localhost:8000, https://kroki.example.com/ ,,").unwrap();
        let urls: Vec<&str> = lb.all_backends().iter().map(|b| b.url.as_str()).collect();
        assert_eq!(urls, vec!["http://localhost:8000", "https://kroki.example.com"]);
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(LoadBalancer::new(" , ").is_none());
    }

    #[test]
    fn round_robin_skips_unhealthy() {
        let lb = LoadBalancer::new("a:1,b:2,c:3").unwrap();
        lb.all_backends()[1].set_healthy(false);

        let picked: Vec<String> = (0..4).map(|_| lb.get_backend().unwrap().url.clone()).collect();
        assert!(picked.iter().all(|u| u != "http://b:2"));
        assert!(picked.contains(&"http://a:1".to_string()));
        assert!(picked.contains(&"http://c:3".to_string()));
    }

    #[test]
    fn none_when_all_down() {
        let lb = LoadBalancer::new("a:1").unwrap();
        lb.all_backends()[0].set_healthy(false);
        assert!(lb.get_backend().is_none());
    }
}
